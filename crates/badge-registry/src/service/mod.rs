//! 服务层
//!
//! - `registry`: 徽章授予与查询

pub mod registry;

pub use registry::{BadgeRegistry, DEFAULT_COLLECTION};
