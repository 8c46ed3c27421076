//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按播放列表分键的优先级等待队列。

use super::priority::LockPriority;
use crate::error::{CacheError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::model::PlaylistId;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;

/// 等待中的请求
struct Waiter {
    priority: LockPriority,
    seq: u64,
    grant: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    // BinaryHeap 是最大堆，反转比较使 (priority, seq) 最小者先出队
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

/// 单个键的状态
#[derive(Default)]
struct KeyQueue {
    /// 正在运行的请求序号
    running: Option<u64>,
    waiting: BinaryHeap<Waiter>,
}

impl KeyQueue {
    fn is_idle(&self) -> bool {
        self.running.is_none() && self.waiting.is_empty()
    }
}

/// 锁表
///
/// 每个键同一时刻最多放行一个请求，其余请求按 `(优先级, 提交序号)` 排队
#[derive(Default)]
pub(crate) struct LockTable {
    queues: DashMap<PlaylistId, KeyQueue>,
    sequence: AtomicU64,
}

impl LockTable {
    /// 将请求加入队列
    pub(crate) fn enqueue(self: &Arc<Self>, key: &PlaylistId, priority: LockPriority) -> Ticket {
        let seq = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let depth = {
            let mut queue = self.queues.entry(key.clone()).or_default();
            queue.waiting.push(Waiter {
                priority,
                seq,
                grant: tx,
            });
            queue.waiting.len()
        };
        GLOBAL_METRICS.set_queue_depth(key.as_str(), depth);
        trace!("enqueued lock request {} for {} ({})", seq, key, priority);

        Ticket {
            table: Arc::clone(self),
            key: key.clone(),
            seq,
            grant: Some(rx),
            admitted: false,
        }
    }

    /// 若键空闲，放行队首请求
    pub(crate) fn dispatch(&self, key: &PlaylistId) {
        let (depth, idle) = {
            let Some(mut queue) = self.queues.get_mut(key) else {
                return;
            };
            while queue.running.is_none() {
                let Some(waiter) = queue.waiting.pop() else {
                    break;
                };
                // 接收端已丢弃说明请求被取消，跳过
                if waiter.grant.send(()).is_ok() {
                    trace!("admitted lock request {} for {}", waiter.seq, key);
                    queue.running = Some(waiter.seq);
                }
            }
            (queue.waiting.len(), queue.is_idle())
        };

        GLOBAL_METRICS.set_queue_depth(key.as_str(), depth);
        if idle {
            self.queues.remove_if(key, |_, queue| queue.is_idle());
        }
    }

    /// 运行结束，释放键并放行下一个请求
    pub(crate) fn release(&self, key: &PlaylistId, seq: u64) {
        if let Some(mut queue) = self.queues.get_mut(key) {
            if queue.running == Some(seq) {
                queue.running = None;
            }
        }
        self.dispatch(key);
    }

    /// 取消尚未开始运行的请求
    fn cancel(&self, key: &PlaylistId, seq: u64) {
        if let Some(mut queue) = self.queues.get_mut(key) {
            if queue.running == Some(seq) {
                // 已被放行但调用方没有等到，转交给下一个请求
                queue.running = None;
            } else {
                queue.waiting.retain(|w| w.seq != seq);
            }
        }
        self.dispatch(key);
    }

    pub(crate) fn is_locked(&self, key: &PlaylistId) -> bool {
        self.queues
            .get(key)
            .map(|q| q.running.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn queue_depth(&self, key: &PlaylistId) -> usize {
        self.queues.get(key).map(|q| q.waiting.len()).unwrap_or(0)
    }
}

/// 排队凭证
///
/// 在被放行前丢弃会把请求移出队列
pub(crate) struct Ticket {
    table: Arc<LockTable>,
    key: PlaylistId,
    seq: u64,
    grant: Option<oneshot::Receiver<()>>,
    admitted: bool,
}

impl Ticket {
    /// 等待被放行
    pub(crate) async fn wait(mut self) -> Result<LockGuard> {
        let grant = self
            .grant
            .take()
            .ok_or_else(|| CacheError::Lock("lock ticket already used".to_string()))?;
        grant
            .await
            .map_err(|_| CacheError::Lock(format!("lock queue for {} was closed", self.key)))?;
        self.admitted = true;

        Ok(LockGuard {
            table: Arc::clone(&self.table),
            key: self.key.clone(),
            seq: self.seq,
        })
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.admitted {
            trace!("lock request {} for {} abandoned", self.seq, self.key);
            self.table.cancel(&self.key, self.seq);
        }
    }
}

/// 持锁守卫，丢弃时释放键
pub(crate) struct LockGuard {
    table: Arc<LockTable>,
    key: PlaylistId,
    seq: u64,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.table.release(&self.key, self.seq);
    }
}
