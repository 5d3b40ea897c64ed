//! HTTP 层错误类型
//!
//! 将注册表错误映射为 HTTP 状态码和统一的 JSON 错误体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::dto::ApiResponse;
use crate::error::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("徽章不存在: {0}")]
    BadgeNotFound(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadgeNotFound(_) => StatusCode::NOT_FOUND,
            Self::Registry(RegistryError::NotInitialized) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Registry(RegistryError::Store(e)) if e.is_connection_failure() => {
                StatusCode::BAD_GATEWAY
            }
            Self::Registry(RegistryError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadgeNotFound(_) => "BADGE_NOT_FOUND",
            Self::Registry(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 存储错误只返回通用提示，详细信息记录日志
        let message = match &self {
            Self::Registry(RegistryError::Store(e)) => {
                tracing::error!(error = %e, code = e.error_code(), "存储操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiResponse::<()>::error(self.error_code(), message);
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
