//! HTTP 接口层
//!
//! - `POST /api/badges/{badge_id}/awards`: 授予徽章
//! - `GET /api/badges/{badge_id}`: 查询徽章记录
//! - `GET /health`: 健康检查

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use badge_shared::observability::middleware as obs_middleware;

pub use dto::{ApiResponse, AwardRequest};
pub use error::ApiError;
pub use state::AppState;

/// 徽章相关路由
pub fn badge_routes() -> Router<AppState> {
    Router::new()
        .route("/badges/{badge_id}", get(handlers::get_badge))
        .route("/badges/{badge_id}/awards", post(handlers::award_badge))
}

/// 构建完整的应用路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", badge_routes())
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
