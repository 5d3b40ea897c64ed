//! 文档存储 Trait 定义
//!
//! 注册表只依赖这组抽象，具体后端（内存、PostgreSQL、Redis）可互换，也便于 mock 测试。

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::Document;
use crate::models::document::{array_field_contains, single_element_document};

/// 集合并写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionOutcome {
    /// 文档不存在，已创建并写入该值
    Created,
    /// 文档已存在，值已并入数组字段
    Added,
    /// 值已在数组字段中，未发生写入
    AlreadyPresent,
}

/// 文档存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 后端名称，用于日志和健康检查
    fn backend_name(&self) -> &'static str;

    /// 读取文档，不存在时返回 None
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// 创建文档
    ///
    /// 与并发创建竞争时允许覆盖：初始文档只包含一个元素，覆盖不会丢失其他授予。
    async fn create_document(&self, collection: &str, id: &str, data: Document)
    -> StoreResult<()>;

    /// 以集合并语义向数组字段追加值（值已存在时不变），对存储而言是原子的
    ///
    /// 文档不存在时返回 [`StoreError::DocumentNotFound`]。
    async fn merge_array_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()>;

    /// 把值并入数组字段，文档不存在时先创建
    ///
    /// 默认实现为先读后写：两个并发调用可能都看到"不存在"，但合并写入是幂等的，
    /// 结果仍然正确。支持原子 upsert 的后端应覆盖此方法，消除这一竞争窗口。
    async fn union_into(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<UnionOutcome> {
        read_then_union(self, collection, id, field, value).await
    }

    /// 健康检查
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// 先读后写的集合并流程
///
/// 1. 读取文档
/// 2. 不存在：创建 `{field: [value]}`
/// 3. 已包含该值：不写入
/// 4. 未包含：通过合并写入追加，不整体覆盖文档
///
/// 每次调用最多一次写入。
pub async fn read_then_union<S>(
    store: &S,
    collection: &str,
    id: &str,
    field: &str,
    value: &str,
) -> StoreResult<UnionOutcome>
where
    S: DocumentStore + ?Sized,
{
    let Some(document) = store.get_document(collection, id).await? else {
        store
            .create_document(collection, id, single_element_document(field, value))
            .await?;
        return Ok(UnionOutcome::Created);
    };

    let present = array_field_contains(&document, field, value)
        .map_err(|reason| StoreError::malformed(collection, id, reason))?;
    if present {
        return Ok(UnionOutcome::AlreadyPresent);
    }

    store.merge_array_field(collection, id, field, value).await?;
    Ok(UnionOutcome::Added)
}
