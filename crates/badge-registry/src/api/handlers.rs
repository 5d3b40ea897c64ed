//! 徽章注册表 API 处理器

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::dto::{ApiResponse, AwardRequest};
use super::error::{ApiError, Result};
use super::state::AppState;
use crate::models::{AwardResult, BadgeRecord};

/// 授予徽章
///
/// POST /api/badges/{badge_id}/awards
///
/// 本次创建了徽章记录时返回 201，其余情况返回 200。
pub async fn award_badge(
    State(state): State<AppState>,
    Path(badge_id): Path<String>,
    Json(req): Json<AwardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AwardResult>>)> {
    let result = state.registry.award(&badge_id, &req.uid).await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::success(result))))
}

/// 查询徽章记录
///
/// GET /api/badges/{badge_id}
pub async fn get_badge(
    State(state): State<AppState>,
    Path(badge_id): Path<String>,
) -> Result<Json<ApiResponse<BadgeRecord>>> {
    let record = state
        .registry
        .info(&badge_id)
        .await?
        .ok_or(ApiError::BadgeNotFound(badge_id))?;

    Ok(Json(ApiResponse::success(record)))
}

/// 健康检查：包含文档存储连通性
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    let backend = state.registry.health_check().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "badge-registry",
        "store": backend
    })))
}
