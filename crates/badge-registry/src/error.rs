//! 徽章注册表错误类型
//!
//! 注册表只区分两类失败：存储未配置，以及存储本身的失败。
//! 存储错误原样向上传递，注册表不做重试也不吞掉任何错误。

use badge_shared::error::InfraError;
use thiserror::Error;

/// 文档存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("文档不存在: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("文档格式错误: {collection}/{id} - {reason}")]
    MalformedDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("存储后端不可用: {0}")]
    Unavailable(String),
}

/// 存储层 Result 类型别名
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn malformed(collection: &str, id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::DocumentNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// 是否为可重试错误（由调用方决定是否重试）
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Redis(_) | Self::Unavailable(_))
    }

    /// 是否为后端连接失败（连接拒绝、断开、连接池耗尽等）
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            Self::Redis(e) => e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped(),
            Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

impl From<InfraError> for StoreError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Database(e) => Self::Database(e),
            InfraError::Redis(e) => Self::Redis(e),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// 徽章注册表错误类型
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("文档存储未初始化")]
    NotInitialized,

    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
}

/// 徽章注册表 Result 类型别名
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::Store(e) => e.error_code(),
        }
    }

    /// 未初始化需要修正配置，重试没有意义
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotInitialized => false,
            Self::Store(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(RegistryError::NotInitialized.error_code(), "NOT_INITIALIZED");
        assert_eq!(
            RegistryError::from(StoreError::not_found("badges", "b1")).error_code(),
            "DOCUMENT_NOT_FOUND"
        );
        assert_eq!(
            RegistryError::from(StoreError::Unavailable("down".to_string())).error_code(),
            "STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(!RegistryError::NotInitialized.is_retryable());
        assert!(RegistryError::from(StoreError::Database(sqlx::Error::PoolTimedOut)).is_retryable());
        assert!(!RegistryError::from(StoreError::malformed("badges", "b1", "bad")).is_retryable());
    }

    #[test]
    fn test_is_connection_failure() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_connection_failure());
        assert!(StoreError::Unavailable("down".to_string()).is_connection_failure());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_connection_failure());
        assert!(!StoreError::not_found("badges", "b1").is_connection_failure());
    }

    #[test]
    fn test_infra_error_conversion() {
        let err = StoreError::from(InfraError::Database(sqlx::Error::PoolClosed));
        assert!(matches!(err, StoreError::Database(_)));

        let err = StoreError::from(InfraError::Internal("boom".to_string()));
        assert!(matches!(err, StoreError::Unavailable(msg) if msg.contains("boom")));
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::malformed("badges", "first-login", "awards 不是数组");
        let text = err.to_string();
        assert!(text.contains("badges/first-login"));
        assert!(text.contains("awards"));
    }
}
