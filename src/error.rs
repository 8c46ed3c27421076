//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 播出缓存系统错误类型枚举
///
/// 定义了实体缓存、缓存聚合、锁调度器以及文档存储中可能发生的各种错误
#[derive(Error, Debug)]
pub enum CacheError {
    /// 插入的实体ID已存在
    #[error("Duplicate id \"{id}\" in collection {collection}")]
    DuplicateId { collection: String, id: String },

    /// 实体不存在
    #[error("Document \"{id}\" not found in collection {collection}")]
    NotFound { collection: String, id: String },

    /// 修改器无效（仅支持 `$set`）
    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    /// assert_no_changes 检查失败
    #[error("Unexpected changes: {0}")]
    UnexpectedChanges(String),

    /// 在同一任务中对同一键重复加锁
    #[error("Re-entrant lock acquisition: {0}")]
    ReentrantLock(String),

    /// 锁调度错误
    #[error("Lock error: {0}")]
    Lock(String),

    /// 文档存储错误
    #[error("Store error: {0}")]
    Store(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 播出操作前置条件不满足
    #[error("Playout error: {0}")]
    Playout(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    /// 构造 NotFound 错误
    pub fn not_found(collection: impl ToString, id: impl ToString) -> Self {
        CacheError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// 构造 DuplicateId 错误
    pub fn duplicate_id(collection: impl ToString, id: impl ToString) -> Self {
        CacheError::DuplicateId {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
