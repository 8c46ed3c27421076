//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了文档存储接口以及内存和文件两种实现。
//!
//! 缓存层只依赖 [`DocumentStore`] 特征，每个脏实体对应一次写调用；
//! 存储内部是否批量处理只是优化，不属于接口约定。

pub mod file;
pub mod filter;
pub mod memory;

use crate::error::Result;
use crate::model::CollectionName;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use file::FileStore;
pub use filter::Filter;
pub use memory::MemoryStore;

/// 单条写操作
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// 插入完整文档
    Insert(Value),
    /// 仅更新发生变化的字段
    Update { id: String, set: Map<String, Value> },
    /// 删除文档
    Remove { id: String },
}

impl WriteOp {
    /// 操作涉及的文档ID
    pub fn id(&self) -> Option<&str> {
        match self {
            WriteOp::Insert(doc) => doc.get(crate::model::ID_FIELD).and_then(Value::as_str),
            WriteOp::Update { id, .. } | WriteOp::Remove { id } => Some(id),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            WriteOp::Insert(_) => ChangeKind::Added,
            WriteOp::Update { .. } => ChangeKind::Changed,
            WriteOp::Remove { .. } => ChangeKind::Removed,
        }
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Changed => "changed",
            ChangeKind::Removed => "removed",
        }
    }
}

/// 变更通知
///
/// 存储在写入成功后发布，供外部的响应式订阅层消费
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: CollectionName,
    pub kind: ChangeKind,
    pub id: String,
}

/// 文档存储特征
///
/// 按集合提供单文档的读写操作，文档以JSON表示，主键字段为 `_id`
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 按ID查找文档
    async fn find_one(&self, collection: CollectionName, id: &str) -> Result<Option<Value>>;

    /// 按过滤条件查找文档
    async fn find(&self, collection: CollectionName, filter: &Filter) -> Result<Vec<Value>>;

    /// 插入文档，ID已存在时返回 `DuplicateId`
    async fn insert_one(&self, collection: CollectionName, doc: Value) -> Result<()>;

    /// 对文档执行 `$set` 更新
    async fn update_one(
        &self,
        collection: CollectionName,
        id: &str,
        set: Map<String, Value>,
    ) -> Result<()>;

    /// 删除文档
    async fn remove_one(&self, collection: CollectionName, id: &str) -> Result<()>;

    /// 批量写入
    ///
    /// 默认实现逐条调用单文档操作，遇到第一个错误即返回
    ///
    /// # 返回值
    ///
    /// 返回成功执行的写操作数量
    async fn bulk_write(&self, collection: CollectionName, ops: Vec<WriteOp>) -> Result<usize> {
        let mut written = 0;
        for op in ops {
            match op {
                WriteOp::Insert(doc) => self.insert_one(collection, doc).await?,
                WriteOp::Update { id, set } => self.update_one(collection, &id, set).await?,
                WriteOp::Remove { id } => self.remove_one(collection, &id).await?,
            }
            written += 1;
        }
        Ok(written)
    }
}

/// 从文档中读取 `_id`
pub(crate) fn document_id(doc: &Value) -> Result<String> {
    doc.get(crate::model::ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| crate::error::CacheError::Store("document is missing _id".to_string()))
}
