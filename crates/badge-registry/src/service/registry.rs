//! 徽章注册表服务
//!
//! 负责徽章授予和授予名单查询。每个徽章在存储中对应一个文档，
//! `awards` 字段保存已获得该徽章的用户 ID 集合。
//!
//! ## 授予语义
//!
//! 对同一徽章、同一用户最多授予一次：
//! - 徽章记录不存在：创建记录，状态 `created_and_awarded`
//! - 用户已在名单中：不写入，状态 `already_awarded`
//! - 用户不在名单中：合并写入（不覆盖整个文档），状态 `awarded`
//!
//! 存储错误原样返回，不重试。

use std::sync::Arc;
use std::time::Instant;

use badge_shared::observability::metrics;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{RegistryError, Result};
use crate::models::{AWARDS_FIELD, AwardResult, AwardStatus, BadgeRecord};
use crate::store::DocumentStore;

/// 默认集合名
pub const DEFAULT_COLLECTION: &str = "badges";

/// 徽章注册表
///
/// 存储在构造时传入，或在启动完成后通过 [`BadgeRegistry::set_store`] 延迟注入。
/// 注入前的所有操作返回 [`RegistryError::NotInitialized`]。
pub struct BadgeRegistry {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    collection: String,
}

impl BadgeRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store: RwLock::new(Some(store)),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// 创建未配置存储的注册表
    pub fn unconfigured() -> Self {
        Self {
            store: RwLock::new(None),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// 设置文档存储
    ///
    /// 重复调用会替换之前的存储。
    pub async fn set_store(&self, store: Arc<dyn DocumentStore>) {
        let backend = store.backend_name();
        let mut guard = self.store.write().await;
        if guard.is_some() {
            warn!(backend, "BadgeRegistry 文档存储被替换");
        }
        *guard = Some(store);
        info!(backend, "BadgeRegistry 文档存储已设置");
    }

    pub async fn is_initialized(&self) -> bool {
        self.store.read().await.is_some()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.clone().ok_or(RegistryError::NotInitialized)
    }

    /// 授予徽章
    ///
    /// 不校验 badge_id 和 uid 的格式，由存储决定是否接受。
    #[instrument(skip(self), fields(collection = %self.collection, status = tracing::field::Empty))]
    pub async fn award(&self, badge_id: &str, uid: &str) -> Result<AwardResult> {
        let store = self.store().await?;
        let start = Instant::now();

        let outcome = store
            .union_into(&self.collection, badge_id, AWARDS_FIELD, uid)
            .await
            .inspect_err(|e| metrics::record_store_error(e.error_code()))?;

        let status = AwardStatus::from(outcome);
        tracing::Span::current().record("status", status.as_str());
        metrics::record_badge_award(status.as_str(), start.elapsed().as_secs_f64());

        if status == AwardStatus::AlreadyAwarded {
            debug!("用户已获得该徽章，跳过写入");
        } else {
            info!(%status, "徽章授予成功");
        }

        Ok(AwardResult::new(badge_id, uid, status))
    }

    /// 查询徽章记录
    ///
    /// 记录不存在返回 `None`，不视为错误。
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn info(&self, badge_id: &str) -> Result<Option<BadgeRecord>> {
        let store = self.store().await?;

        let document = store
            .get_document(&self.collection, badge_id)
            .await
            .inspect_err(|e| metrics::record_store_error(e.error_code()))?;

        metrics::record_badge_info(document.is_some());

        let Some(document) = document else {
            debug!("徽章记录不存在");
            return Ok(None);
        };

        let record = BadgeRecord::from_document(&self.collection, badge_id, document)
            .inspect_err(|e| metrics::record_store_error(e.error_code()))?;
        Ok(Some(record))
    }

    /// 存储健康检查
    pub async fn health_check(&self) -> Result<&'static str> {
        let store = self.store().await?;
        store.health_check().await?;
        Ok(store.backend_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryDocumentStore, MockDocumentStore, UnionOutcome};
    use mockall::predicate::eq;
    use serde_json::{Value, json};

    fn doc(value: Value) -> crate::models::Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_registry() {
        let registry = BadgeRegistry::unconfigured();
        assert!(!registry.is_initialized().await);

        let err = registry.award("first-login", "u1").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotInitialized));

        let err = registry.info("first-login").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotInitialized));

        assert!(registry.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_late_injection() {
        let registry = BadgeRegistry::unconfigured();
        registry
            .set_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        assert!(registry.is_initialized().await);

        let result = registry.award("first-login", "u1").await.unwrap();
        assert_eq!(result.status, AwardStatus::CreatedAndAwarded);
        assert_eq!(registry.health_check().await.unwrap(), "memory");
    }

    #[tokio::test]
    async fn test_award_uses_configured_collection_and_field() {
        let mut store = MockDocumentStore::new();
        store
            .expect_union_into()
            .with(eq("trophies"), eq("first-login"), eq("awards"), eq("u1"))
            .times(1)
            .returning(|_, _, _, _| Ok(UnionOutcome::Added));

        let registry = BadgeRegistry::new(Arc::new(store)).with_collection("trophies");
        let result = registry.award("first-login", "u1").await.unwrap();

        assert_eq!(result.status, AwardStatus::Awarded);
        assert!(!result.created);
        assert!(!result.already_awarded);
        assert_eq!(result.badge_id, "first-login");
        assert_eq!(result.uid, "u1");
    }

    #[tokio::test]
    async fn test_award_propagates_store_error() {
        let mut store = MockDocumentStore::new();
        store
            .expect_union_into()
            .times(1)
            .returning(|_, _, _, _| Err(StoreError::Unavailable("down".to_string())));

        let registry = BadgeRegistry::new(Arc::new(store));
        let err = registry.award("b", "u1").await.unwrap_err();
        assert!(matches!(err, RegistryError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_info_absent_is_none() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get_document()
            .with(eq("badges"), eq("never"))
            .returning(|_, _| Ok(None));

        let registry = BadgeRegistry::new(Arc::new(store));
        assert!(registry.info("never").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_info_returns_full_record() {
        let mut store = MockDocumentStore::new();
        store.expect_get_document().returning(|_, _| {
            Ok(Some(doc(json!({"awards": ["u1", "u2"], "title": "First Login"}))))
        });
        store.expect_create_document().times(0);
        store.expect_merge_array_field().times(0);

        let registry = BadgeRegistry::new(Arc::new(store));
        let record = registry.info("first-login").await.unwrap().unwrap();
        assert_eq!(record.awards, vec!["u1", "u2"]);
        assert_eq!(record.extra.get("title"), Some(&json!("First Login")));
    }

    #[tokio::test]
    async fn test_info_malformed_record() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get_document()
            .returning(|_, _| Ok(Some(doc(json!({"awards": {"u1": true}})))));

        let registry = BadgeRegistry::new(Arc::new(store));
        let err = registry.info("b").await.unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let mut store = MockDocumentStore::new();
        store.expect_backend_name().return_const("mock");
        store
            .expect_health_check()
            .returning(|| Err(StoreError::Unavailable("down".to_string())));

        let registry = BadgeRegistry::new(Arc::new(store));
        assert!(registry.health_check().await.is_err());
    }
}
