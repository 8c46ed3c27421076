//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存的文档存储实现。

use super::{document_id, ChangeEvent, ChangeKind, DocumentStore, Filter};
use crate::error::{CacheError, Result};
use crate::model::{CollectionName, ID_FIELD};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

/// 变更通知通道容量
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// 内存文档存储
///
/// 每个集合是一个按ID排序的映射，写入成功后通过广播通道发布变更通知
pub struct MemoryStore {
    collections: DashMap<CollectionName, BTreeMap<String, Value>>,
    write_counts: DashMap<(CollectionName, ChangeKind), u64>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 创建空的内存存储
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: DashMap::new(),
            write_counts: DashMap::new(),
            changes,
        }
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// 同步读取文档，不经过异步接口
    pub fn peek(&self, collection: CollectionName, id: &str) -> Option<Value> {
        self.collections
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// 集合中的全部文档
    pub fn snapshot(&self, collection: CollectionName) -> Vec<Value> {
        self.collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 直接写入一批文档，不计入写入统计也不发布通知
    pub fn seed(&self, collection: CollectionName, docs: Vec<Value>) -> Result<()> {
        let mut entry = self.collections.entry(collection).or_default();
        for doc in docs {
            let id = document_id(&doc)?;
            entry.insert(id, doc);
        }
        Ok(())
    }

    /// 某集合某类写操作的累计次数
    pub fn write_count(&self, collection: CollectionName, kind: ChangeKind) -> u64 {
        self.write_counts
            .get(&(collection, kind))
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// 所有写操作的累计次数
    pub fn total_writes(&self) -> u64 {
        self.write_counts.iter().map(|e| *e.value()).sum()
    }

    /// 清零写入统计
    pub fn reset_write_counts(&self) {
        self.write_counts.clear();
    }

    fn record(&self, collection: CollectionName, kind: ChangeKind, id: String) {
        *self.write_counts.entry((collection, kind)).or_insert(0) += 1;
        // 没有订阅者时发送失败，忽略即可
        let _ = self.changes.send(ChangeEvent {
            collection,
            kind,
            id,
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: CollectionName, id: &str) -> Result<Option<Value>> {
        Ok(self.peek(collection, id))
    }

    async fn find(&self, collection: CollectionName, filter: &Filter) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self, doc), level = "debug")]
    async fn insert_one(&self, collection: CollectionName, doc: Value) -> Result<()> {
        let id = document_id(&doc)?;
        {
            let mut docs = self.collections.entry(collection).or_default();
            if docs.contains_key(&id) {
                return Err(CacheError::duplicate_id(collection, &id));
            }
            docs.insert(id.clone(), doc);
        }
        debug!("insert {}/{}", collection, id);
        self.record(collection, ChangeKind::Added, id);
        Ok(())
    }

    #[instrument(skip(self, set), level = "debug")]
    async fn update_one(
        &self,
        collection: CollectionName,
        id: &str,
        set: Map<String, Value>,
    ) -> Result<()> {
        if set.contains_key(ID_FIELD) {
            return Err(CacheError::Store(format!(
                "update of {}/{} may not change {}",
                collection, id, ID_FIELD
            )));
        }
        {
            let mut docs = self.collections.entry(collection).or_default();
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| CacheError::not_found(collection, id))?;
            let fields = doc
                .as_object_mut()
                .ok_or_else(|| CacheError::Store(format!("{}/{} is not an object", collection, id)))?;
            for (key, value) in set {
                fields.insert(key, value);
            }
        }
        debug!("update {}/{}", collection, id);
        self.record(collection, ChangeKind::Changed, id.to_string());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_one(&self, collection: CollectionName, id: &str) -> Result<()> {
        let removed = self
            .collections
            .get_mut(&collection)
            .and_then(|mut docs| docs.remove(id));
        if removed.is_none() {
            return Err(CacheError::not_found(collection, id));
        }
        debug!("remove {}/{}", collection, id);
        self.record(collection, ChangeKind::Removed, id.to_string());
        Ok(())
    }
}
