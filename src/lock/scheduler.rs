//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出锁调度器：同一播放列表的操作串行执行，
//! 每个操作在锁内加载缓存、修改并提交。

use super::priority::LockPriority;
use super::queue::LockTable;
use crate::cache::PlayoutCache;
use crate::config::LockConfig;
use crate::error::{CacheError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::model::PlaylistId;
use crate::store::DocumentStore;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

tokio::task_local! {
    /// 当前任务已持有的键
    static HELD_KEYS: Vec<PlaylistId>;
}

/// 播出锁调度器
///
/// 不同播放列表的操作可以并发执行；同一播放列表同一时刻只有一个操作运行，
/// 等待中的请求按优先级放行，同优先级按提交顺序
pub struct PlayoutLockScheduler {
    store: Arc<dyn DocumentStore>,
    table: Arc<LockTable>,
    config: LockConfig,
}

impl std::fmt::Debug for PlayoutLockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayoutLockScheduler")
            .field("config", &self.config)
            .finish()
    }
}

impl PlayoutLockScheduler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: LockConfig) -> Self {
        Self {
            store,
            table: Arc::new(LockTable::default()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// 键当前是否有操作在运行
    pub fn is_locked(&self, key: &PlaylistId) -> bool {
        self.table.is_locked(key)
    }

    /// 键上等待中的请求数量
    pub fn queue_depth(&self, key: &PlaylistId) -> usize {
        self.table.queue_depth(key)
    }

    /// 在播放列表锁内执行操作
    ///
    /// 获得锁后加载 [`PlayoutCache`]，执行 `operation`，成功时提交所有修改。
    /// 操作返回错误时不写入任何数据。无论结果如何，返回前都会释放锁。
    ///
    /// # 参数
    ///
    /// * `key` - 播放列表ID
    /// * `priority` - 请求优先级
    /// * `operation` - 操作闭包
    ///
    /// # 返回值
    ///
    /// 操作的返回值；同一任务内对同一键重复加锁时返回 `ReentrantLock`
    #[instrument(skip_all, level = "debug", fields(playlist = %key, priority = %priority))]
    pub async fn run_with_cache<R, F>(
        &self,
        key: &PlaylistId,
        priority: LockPriority,
        operation: F,
    ) -> Result<R>
    where
        F: for<'c> FnOnce(&'c mut PlayoutCache) -> BoxFuture<'c, Result<R>> + Send,
        R: Send,
    {
        let held = HELD_KEYS.try_with(|keys| keys.clone()).unwrap_or_default();
        if held.contains(key) {
            return Err(CacheError::ReentrantLock(format!(
                "playlist {} is already locked by the current task",
                key
            )));
        }

        let queued_at = Instant::now();
        let ticket = self.table.enqueue(key, priority);
        // 同一轮提交的请求都入队后再按优先级放行
        tokio::task::yield_now().await;
        self.table.dispatch(key);
        let _guard = ticket.wait().await?;

        let waited = queued_at.elapsed();
        GLOBAL_METRICS.record_lock_wait(priority.as_str(), waited.as_secs_f64());
        if waited.as_millis() as u64 > self.config.slow_wait_warn_ms {
            warn!(
                "waited {}ms for playout lock on {} ({})",
                waited.as_millis(),
                key,
                priority
            );
        }

        let mut keys = held;
        keys.push(key.clone());
        let started = Instant::now();
        let result = HELD_KEYS.scope(keys, self.execute(key, operation)).await;

        let held_for = started.elapsed();
        GLOBAL_METRICS.record_lock_hold(priority.as_str(), held_for.as_secs_f64());
        if held_for.as_millis() as u64 > self.config.slow_hold_warn_ms {
            warn!(
                "held playout lock on {} for {}ms ({})",
                key,
                held_for.as_millis(),
                priority
            );
        }
        result
    }

    /// 同步版本的 [`run_with_cache`](Self::run_with_cache)
    pub async fn run_with_cache_sync<R, F>(
        &self,
        key: &PlaylistId,
        priority: LockPriority,
        operation: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut PlayoutCache) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.run_with_cache(key, priority, move |cache| {
            Box::pin(async move { operation(cache) })
        })
        .await
    }

    async fn execute<R, F>(&self, key: &PlaylistId, operation: F) -> Result<R>
    where
        F: for<'c> FnOnce(&'c mut PlayoutCache) -> BoxFuture<'c, Result<R>> + Send,
        R: Send,
    {
        let mut cache = PlayoutCache::load(self.store.as_ref(), key).await?;
        match operation(&mut cache).await {
            Ok(value) => {
                let summary = cache.save_all_to_database(self.store.as_ref()).await?;
                debug!(
                    "committed {} writes for playlist {}",
                    summary.total_writes(),
                    key
                );
                GLOBAL_METRICS.record_transaction(key.as_str(), "committed");
                Ok(value)
            }
            Err(e) => {
                debug!("operation on playlist {} failed, discarding: {}", key, e);
                GLOBAL_METRICS.record_transaction(key.as_str(), "aborted");
                Err(e)
            }
        }
    }
}
