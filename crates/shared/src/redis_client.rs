//! Redis 连接管理模块
//!
//! 封装 Redis 客户端与多路复用连接，提供哈希读写与 Lua 脚本执行。

use std::collections::HashMap;

use crate::config::RedisConfig;
use crate::error::{InfraError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, FromRedisValue, Script};
use tokio::sync::OnceCell;
use tracing::{info, instrument};

/// Redis 客户端
///
/// 多路复用连接在首次使用时建立，之后所有调用共享同一连接的克隆。
pub struct RedisClient {
    client: Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisClient {
    /// 创建 Redis 客户端（不会立即建立连接）
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    /// 获取连接
    pub async fn connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(InfraError::from)
            })
            .await?;
        Ok(conn.clone())
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(InfraError::from)
    }

    /// 读取哈希的全部字段，键不存在时返回空表
    #[instrument(skip(self))]
    pub async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    /// 用给定字段整体替换哈希（DEL + HSET 在同一个事务中执行）
    #[instrument(skip(self, fields))]
    pub async fn replace_hash(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// 删除键
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// 执行 Lua 脚本
    ///
    /// 脚本在 Redis 端原子执行，适合实现读-判断-写的复合操作。
    #[instrument(skip(self, script, args))]
    pub async fn eval<T: FromRedisValue>(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T> {
        let mut conn = self.connection().await?;
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let value = invocation.invoke_async(&mut conn).await?;
        Ok(value)
    }
}

/// 文档键生成
pub struct DocumentKey;

impl DocumentKey {
    pub fn build(prefix: &str, collection: &str, id: &str) -> String {
        format!("{}:{}:{}", prefix, collection, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_redis_config;

    #[test]
    fn test_document_key_generation() {
        assert_eq!(DocumentKey::build("doc", "badges", "first-login"), "doc:badges:first-login");
    }

    #[test]
    fn test_client_creation_is_lazy() {
        // 地址不可达时创建客户端也不应失败，连接在首次使用时建立
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        };
        assert!(RedisClient::new(&config).is_ok());
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_hash_replace_roundtrip() {
        let client = RedisClient::new(&test_redis_config()).unwrap();
        client.health_check().await.unwrap();

        let key = format!("test:hash:{}", uuid::Uuid::new_v4());
        assert!(client.hash_get_all(&key).await.unwrap().is_empty());

        client
            .replace_hash(&key, &[("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())])
            .await
            .unwrap();
        client
            .replace_hash(&key, &[("c".to_string(), "3".to_string())])
            .await
            .unwrap();

        let fields = client.hash_get_all(&key).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("c").map(String::as_str), Some("3"));
        client.delete(&key).await.unwrap();
    }
}
