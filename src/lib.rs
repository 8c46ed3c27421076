//! playout_cache - 播出事务缓存与锁调度
//!
//! 为直播节目单播出提供按播放列表加锁的写回事务缓存：
//! 在锁内加载快照、在内存中修改、提交时只写入差异。

#![doc(html_root_url = "https://docs.rs/playout_cache/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod playout;
pub mod store;
pub mod telemetry;

// Re-export commonly used items
pub use cache::{EntityCache, Modifier, PlayoutCache, PlayoutSnapshot};
pub use config::Config;
pub use error::{CacheError, Result};
pub use lock::{LockPriority, PlayoutLockScheduler};
pub use manager::PlayoutManager;
pub use store::{DocumentStore, FileStore, MemoryStore};

/// playout_cache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
