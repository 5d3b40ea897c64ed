//! PostgreSQL 文档存储
//!
//! 所有集合共用一张 `documents` 表，文档内容存放在 JSONB 列中。
//! 集合并通过单条 `INSERT ... ON CONFLICT DO UPDATE ... WHERE` 完成，存在性检查与写入在同一语句内。
//! 语句未写入任何行时再读取一次文档，区分“值已存在”和“字段格式错误”。

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use super::traits::{DocumentStore, UnionOutcome};
use crate::error::{StoreError, StoreResult};
use crate::models::Document;
use crate::models::document::array_field_contains;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection VARCHAR(255) NOT NULL,
    id         VARCHAR(255) NOT NULL,
    data       JSONB        NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
)
"#;

// 字段缺失或为 null 按空数组处理；其他非数组值以及含非字符串元素的数组不满足 WHERE，保持原样
const MERGE_SQL: &str = r#"
UPDATE documents
SET data = jsonb_set(
        data,
        ARRAY[$3::text],
        CASE jsonb_typeof(data -> $3::text)
            WHEN 'array' THEN data -> $3::text
            ELSE '[]'::jsonb
        END || jsonb_build_array($4::text)
    ),
    updated_at = NOW()
WHERE collection = $1 AND id = $2
  AND COALESCE(jsonb_typeof(data -> $3::text), 'null') IN ('null', 'array')
  AND NOT jsonb_path_exists(
        CASE jsonb_typeof(data -> $3::text) WHEN 'array' THEN data -> $3::text ELSE '[]'::jsonb END,
        'strict $[*] ? (@.type() != "string")'
      )
  AND NOT (
        CASE jsonb_typeof(data -> $3::text) WHEN 'array' THEN data -> $3::text ELSE '[]'::jsonb END
        @> jsonb_build_array($4::text)
      )
"#;

// xmax = 0 表示该行由本语句插入；冲突更新被 WHERE 过滤时不返回任何行
const UNION_SQL: &str = r#"
INSERT INTO documents (collection, id, data)
VALUES ($1, $2, jsonb_build_object($3::text, jsonb_build_array($4::text)))
ON CONFLICT (collection, id) DO UPDATE
SET data = jsonb_set(
        documents.data,
        ARRAY[$3::text],
        CASE jsonb_typeof(documents.data -> $3::text)
            WHEN 'array' THEN documents.data -> $3::text
            ELSE '[]'::jsonb
        END || jsonb_build_array($4::text)
    ),
    updated_at = NOW()
WHERE COALESCE(jsonb_typeof(documents.data -> $3::text), 'null') IN ('null', 'array')
  AND NOT jsonb_path_exists(
        CASE jsonb_typeof(documents.data -> $3::text)
            WHEN 'array' THEN documents.data -> $3::text
            ELSE '[]'::jsonb
        END,
        'strict $[*] ? (@.type() != "string")'
      )
  AND NOT (
        CASE jsonb_typeof(documents.data -> $3::text)
            WHEN 'array' THEN documents.data -> $3::text
            ELSE '[]'::jsonb
        END @> jsonb_build_array($4::text)
      )
RETURNING (xmax = 0)
"#;

/// PostgreSQL 文档存储
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 确保文档表存在
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        info!("documents table ready");
        Ok(())
    }

    fn into_document(collection: &str, id: &str, value: Value) -> StoreResult<Document> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::malformed(
                collection,
                id,
                format!("文档不是 JSON 对象: {}", other),
            )),
        }
    }

    /// 条件写入没有生效时，根据写入后的文档判断原因
    ///
    /// 值已在数组中属于幂等成功；字段形状不合法返回格式错误；
    /// 其余情况只可能是文档在两条语句之间被并发修改或删除。
    fn unchanged_outcome(
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
        document: Option<Document>,
    ) -> StoreResult<UnionOutcome> {
        let Some(document) = document else {
            return Err(StoreError::not_found(collection, id));
        };
        let present = array_field_contains(&document, field, value)
            .map_err(|reason| StoreError::malformed(collection, id, reason))?;
        if present {
            Ok(UnionOutcome::AlreadyPresent)
        } else {
            Err(StoreError::Unavailable(format!(
                "文档在写入期间被并发修改: {}/{}",
                collection, id
            )))
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let data: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        data.map(|value| Self::into_document(collection, id, value))
            .transpose()
    }

    #[instrument(skip(self, data))]
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn merge_array_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(MERGE_SQL)
            .bind(collection)
            .bind(id)
            .bind(field)
            .bind(value)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let document = self.get_document(collection, id).await?;
            Self::unchanged_outcome(collection, id, field, value, document)?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn union_into(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<UnionOutcome> {
        let inserted: Option<bool> = sqlx::query_scalar(UNION_SQL)
            .bind(collection)
            .bind(id)
            .bind(field)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        let outcome = match inserted {
            Some(true) => UnionOutcome::Created,
            Some(false) => UnionOutcome::Added,
            None => {
                let document = self.get_document(collection, id).await?;
                Self::unchanged_outcome(collection, id, field, value, document)?
            }
        };
        debug!(?outcome, "jsonb union applied");
        Ok(outcome)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use badge_shared::database::Database;
    use badge_shared::test_utils::{test_badge_id, test_database_config};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    async fn setup() -> PgDocumentStore {
        let db = Database::connect(&test_database_config()).await.unwrap();
        let store = PgDocumentStore::new(db.pool().clone());
        store.ensure_schema().await.unwrap();
        store
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        let err = PgDocumentStore::into_document("badges", "b1", json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument { .. }));
    }

    #[test]
    fn test_unchanged_outcome_classification() {
        let present = doc(json!({"awards": ["u1"]}));
        assert_eq!(
            PgDocumentStore::unchanged_outcome("badges", "b1", "awards", "u1", Some(present)).unwrap(),
            UnionOutcome::AlreadyPresent
        );

        for bad in [json!({"awards": "u1"}), json!({"awards": [1]}), json!({"awards": {"u1": true}})] {
            let err = PgDocumentStore::unchanged_outcome("badges", "b1", "awards", "u1", Some(doc(bad)))
                .unwrap_err();
            assert!(matches!(err, StoreError::MalformedDocument { .. }));
        }

        let err = PgDocumentStore::unchanged_outcome("badges", "b1", "awards", "u1", None).unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));

        let raced = doc(json!({"awards": ["u2"]}));
        let err = PgDocumentStore::unchanged_outcome("badges", "b1", "awards", "u1", Some(raced))
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_union_into_outcomes() {
        let store = setup().await;
        let badge_id = test_badge_id();

        assert_eq!(
            store.union_into("badges", &badge_id, "awards", "u1").await.unwrap(),
            UnionOutcome::Created
        );
        assert_eq!(
            store.union_into("badges", &badge_id, "awards", "u1").await.unwrap(),
            UnionOutcome::AlreadyPresent
        );
        assert_eq!(
            store.union_into("badges", &badge_id, "awards", "u2").await.unwrap(),
            UnionOutcome::Added
        );

        let doc = store.get_document("badges", &badge_id).await.unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({"awards": ["u1", "u2"]}));
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_merge_array_field() {
        let store = setup().await;
        let badge_id = test_badge_id();

        let err = store
            .merge_array_field("badges", &badge_id, "awards", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));

        let mut data = Document::new();
        data.insert("awards".to_string(), json!(["u1"]));
        data.insert("title".to_string(), json!("First Login"));
        store.create_document("badges", &badge_id, data).await.unwrap();

        store.merge_array_field("badges", &badge_id, "awards", "u2").await.unwrap();
        store.merge_array_field("badges", &badge_id, "awards", "u2").await.unwrap();

        let doc = store.get_document("badges", &badge_id).await.unwrap().unwrap();
        assert_eq!(
            Value::Object(doc),
            json!({"awards": ["u1", "u2"], "title": "First Login"})
        );
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_awards_field_shapes() {
        let store = setup().await;

        // null 按空数组处理
        let null_id = test_badge_id();
        store
            .create_document("badges", &null_id, doc(json!({"awards": null, "title": "t"})))
            .await
            .unwrap();
        assert_eq!(
            store.union_into("badges", &null_id, "awards", "u1").await.unwrap(),
            UnionOutcome::Added
        );
        let stored = store.get_document("badges", &null_id).await.unwrap().unwrap();
        assert_eq!(Value::Object(stored), json!({"awards": ["u1"], "title": "t"}));

        // 标量和非字符串数组都拒绝写入，且文档保持原样
        for bad in [json!("u1"), json!([1]), json!(["u2", 3]), json!({"u1": true})] {
            let id = test_badge_id();
            let original = json!({"awards": bad});
            store
                .create_document("badges", &id, doc(original.clone()))
                .await
                .unwrap();

            let err = store.union_into("badges", &id, "awards", "u1").await.unwrap_err();
            assert!(matches!(err, StoreError::MalformedDocument { .. }), "{original}");
            let err = store
                .merge_array_field("badges", &id, "awards", "u1")
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::MalformedDocument { .. }), "{original}");

            let stored = store.get_document("badges", &id).await.unwrap().unwrap();
            assert_eq!(Value::Object(stored), original);
        }
    }
}
