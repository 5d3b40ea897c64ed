//! 应用状态定义

use std::sync::Arc;

use crate::service::BadgeRegistry;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BadgeRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<BadgeRegistry>) -> Self {
        Self { registry }
    }
}
