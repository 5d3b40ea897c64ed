//! 内存文档存储
//!
//! 使用 DashMap 实现，适用于测试和开发环境。集合并写入在分片锁内完成，
//! 并发授予不会丢失任何用户。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::instrument;

use super::traits::{DocumentStore, UnionOutcome};
use crate::error::{StoreError, StoreResult};
use crate::models::Document;
use crate::models::document::{single_element_document, union_array_field};

type DocumentKey = (String, String);

/// 内存文档存储
///
/// Clone 出的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<DashMap<DocumentKey, Document>>,
    writes: Arc<AtomicU64>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> DocumentKey {
        (collection.to_string(), id.to_string())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// 上次清空以来的写入次数（创建和实际发生变化的合并）
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 文档总数
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// 清空所有文档
    pub fn clear(&self) {
        self.documents.clear();
        self.writes.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .documents
            .get(&Self::key(collection, id))
            .map(|entry| entry.value().clone()))
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<()> {
        self.documents.insert(Self::key(collection, id), data);
        self.record_write();
        Ok(())
    }

    async fn merge_array_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut entry = self
            .documents
            .get_mut(&Self::key(collection, id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        let changed = union_array_field(entry.value_mut(), field, value)
            .map_err(|reason| StoreError::malformed(collection, id, reason))?;
        drop(entry);

        if changed {
            self.record_write();
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
        let outcome = match self.documents.entry(Self::key(collection, id)) {
            Entry::Vacant(vacant) => {
                vacant.insert(single_element_document(field, value));
                UnionOutcome::Created
            }
            Entry::Occupied(mut occupied) => {
                let changed = union_array_field(occupied.get_mut(), field, value)
                    .map_err(|reason| StoreError::malformed(collection, id, reason))?;
                if changed {
                    UnionOutcome::Added
                } else {
                    UnionOutcome::AlreadyPresent
                }
            }
        };

        if outcome != UnionOutcome::AlreadyPresent {
            self.record_write();
        }
        Ok(outcome)
    }
}
