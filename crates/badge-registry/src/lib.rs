//! 徽章注册表服务
//!
//! 为用户授予徽章并查询徽章的授予名单，同一用户对同一徽章最多授予一次。
//!
//! ## 核心功能
//!
//! - **徽章授予**：首次授予时创建徽章记录，之后以集合并方式追加用户
//! - **授予查询**：读取徽章记录及其完整授予名单
//! - **可插拔存储**：内存、PostgreSQL（JSONB）、Redis（Lua 脚本）三种文档存储
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `store`: 文档存储抽象与实现
//! - `service`: 徽章注册表服务
//! - `api`: HTTP 接口

pub mod api;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use error::{RegistryError, Result, StoreError, StoreResult};
pub use models::{AWARDS_FIELD, AwardResult, AwardStatus, BadgeRecord, Document};
pub use service::BadgeRegistry;
pub use store::{
    DocumentStore, MemoryDocumentStore, PgDocumentStore, RedisDocumentStore, UnionOutcome,
};
