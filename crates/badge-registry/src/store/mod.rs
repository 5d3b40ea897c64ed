//! 文档存储层
//!
//! 注册表通过 [`DocumentStore`] 访问后端，本模块同时负责按配置构建后端实例。
//!
//! ## 后端
//!
//! - `memory`: 进程内 DashMap，开发和测试使用
//! - `postgres`: `documents` 表 + JSONB，单条 upsert 语句完成集合并
//! - `redis`: 每个文档一个哈希 + Lua 脚本

mod memory;
mod postgres;
mod redis;
mod traits;

use std::sync::Arc;

use badge_shared::config::{AppConfig, StoreBackend};
use badge_shared::database::Database;
use badge_shared::redis_client::RedisClient;
use tracing::{info, instrument};

pub use self::memory::MemoryDocumentStore;
pub use self::postgres::PgDocumentStore;
pub use self::redis::RedisDocumentStore;
pub use self::traits::{DocumentStore, UnionOutcome, read_then_union};

#[cfg(test)]
pub use self::traits::MockDocumentStore;

use crate::error::StoreResult;

/// 按配置连接文档存储
///
/// 连接建立失败直接返回错误，不做重试；PostgreSQL 后端会确保文档表存在。
#[instrument(skip(config), fields(backend = %config.store.backend))]
pub async fn connect(config: &AppConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryDocumentStore::new()),
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            let store = PgDocumentStore::new(db.pool().clone());
            store.ensure_schema().await?;
            Arc::new(store)
        }
        StoreBackend::Redis => {
            let client = RedisClient::new(&config.redis)?;
            client.health_check().await?;
            Arc::new(RedisDocumentStore::new(
                Arc::new(client),
                config.store.key_prefix.clone(),
            ))
        }
    };

    info!(backend = store.backend_name(), "Document store connected");
    Ok(store)
}
