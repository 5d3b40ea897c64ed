//! Redis 文档存储
//!
//! 每个文档保存为一个哈希 `{prefix}:{collection}:{id}`，顶层字段各占一个哈希字段，
//! 值为该字段的 JSON 编码。合并写入由 Lua 脚本在服务端原子执行，
//! 脚本只解码和回写目标数组字段，其他字段原样保留。

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use badge_shared::redis_client::{DocumentKey, RedisClient};
use redis::Script;
use serde_json::Value;
use tracing::{debug, instrument};

use super::traits::{DocumentStore, UnionOutcome};
use crate::error::{StoreError, StoreResult};
use crate::models::Document;

/// 存在标记字段，空文档也对应一个非空哈希
const DOC_MARKER: &str = "\u{0}doc";

/// 脚本返回码
const SCRIPT_MISSING: i64 = -1;
const SCRIPT_MALFORMED: i64 = -2;
const SCRIPT_PRESENT: i64 = 0;
const SCRIPT_ADDED: i64 = 1;
const SCRIPT_CREATED: i64 = 2;

/// 公共部分：校验 ARGV[1] 字段为字符串数组并追加 ARGV[2]
///
/// cjson 无法区分空对象和空数组，因此以 `{` 开头的值直接判为格式错误。
const MERGE_BODY: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
local arr = {}
if raw then
  if string.find(raw, '^%s*{') then
    return -2
  end
  local ok, decoded = pcall(cjson.decode, raw)
  if not ok then
    return -2
  end
  if decoded ~= cjson.null then
    if type(decoded) ~= 'table' then
      return -2
    end
    arr = decoded
  end
end
for _, v in ipairs(arr) do
  if type(v) ~= 'string' then
    return -2
  end
end
for _, v in ipairs(arr) do
  if v == ARGV[2] then
    return 0
  end
end
table.insert(arr, ARGV[2])
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(arr))
return 1
"#;

static MERGE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
{MERGE_BODY}"#
    ))
});

/// 文档不存在时写入存在标记 ARGV[3] 和初始数组 ARGV[4]
static UNION_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('HSET', KEYS[1], ARGV[3], '1', ARGV[1], ARGV[4])
  return 2
end
{MERGE_BODY}"#
    ))
});

/// Redis 文档存储
#[derive(Clone)]
pub struct RedisDocumentStore {
    client: Arc<RedisClient>,
    key_prefix: String,
}

impl RedisDocumentStore {
    pub fn new(client: Arc<RedisClient>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, collection: &str, id: &str) -> String {
        DocumentKey::build(&self.key_prefix, collection, id)
    }

    fn encode_fields(
        collection: &str,
        id: &str,
        data: &Document,
    ) -> StoreResult<Vec<(String, String)>> {
        if data.contains_key(DOC_MARKER) {
            return Err(StoreError::malformed(collection, id, "包含保留字段名"));
        }
        let mut fields = Vec::with_capacity(data.len() + 1);
        fields.push((DOC_MARKER.to_string(), "1".to_string()));
        for (name, value) in data {
            fields.push((name.clone(), serde_json::to_string(value)?));
        }
        Ok(fields)
    }

    fn decode_fields(
        collection: &str,
        id: &str,
        mut fields: HashMap<String, String>,
    ) -> StoreResult<Option<Document>> {
        if fields.is_empty() {
            return Ok(None);
        }
        fields.remove(DOC_MARKER);

        let mut document = Document::new();
        for (name, raw) in fields {
            let value: Value = serde_json::from_str(&raw).map_err(|e| {
                StoreError::malformed(collection, id, format!("字段 {} 不是合法 JSON: {}", name, e))
            })?;
            document.insert(name, value);
        }
        Ok(Some(document))
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let key = self.key(collection, id);
        let fields = self.client.hash_get_all(&key).await?;
        Self::decode_fields(collection, id, fields)
    }

    #[instrument(skip(self, data))]
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<()> {
        let key = self.key(collection, id);
        let fields = Self::encode_fields(collection, id, &data)?;
        self.client.replace_hash(&key, &fields).await?;
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
        let key = self.key(collection, id);
        let code: i64 = self
            .client
            .eval(&MERGE_SCRIPT, &[key.as_str()], &[field, value])
            .await?;

        match code {
            SCRIPT_PRESENT | SCRIPT_ADDED => Ok(()),
            SCRIPT_MISSING => Err(StoreError::not_found(collection, id)),
            SCRIPT_MALFORMED => Err(StoreError::malformed(
                collection,
                id,
                format!("{} 不是字符串数组", field),
            )),
            other => Err(StoreError::Unavailable(format!(
                "合并脚本返回未知结果: {}",
                other
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn union_into(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<UnionOutcome> {
        let key = self.key(collection, id);
        let initial = serde_json::to_string(&[value])?;
        let code: i64 = self
            .client
            .eval(
                &UNION_SCRIPT,
                &[key.as_str()],
                &[field, value, DOC_MARKER, initial.as_str()],
            )
            .await?;

        let outcome = match code {
            SCRIPT_CREATED => UnionOutcome::Created,
            SCRIPT_ADDED => UnionOutcome::Added,
            SCRIPT_PRESENT => UnionOutcome::AlreadyPresent,
            SCRIPT_MALFORMED => {
                return Err(StoreError::malformed(
                    collection,
                    id,
                    format!("{} 不是字符串数组", field),
                ));
            }
            other => {
                return Err(StoreError::Unavailable(format!(
                    "合并脚本返回未知结果: {}",
                    other
                )));
            }
        };
        debug!(?outcome, "redis union applied");
        Ok(outcome)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.client.health_check().await?;
        Ok(())
    }
}
