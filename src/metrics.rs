//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出缓存系统的指标收集和监控功能。

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::Arc;
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集和存储锁调度与缓存提交的运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 写操作总数
    /// key: "collection:kind"
    pub writes_total: Arc<DashMap<String, u64>>,
    /// 事务结果统计
    /// key: "committed" / "aborted" / "failed"
    pub transactions_total: Arc<DashMap<String, u64>>,
    /// 锁等待耗时，key: 优先级 -> (total_duration_secs, count)
    pub lock_wait: Arc<DashMap<String, (f64, u64)>>,
    /// 锁持有耗时，key: 优先级 -> (total_duration_secs, count)
    pub lock_hold: Arc<DashMap<String, (f64, u64)>>,
    /// 每个播放列表的锁等待队列长度
    pub lock_queue_depth: Arc<DashMap<String, usize>>,
    /// 提交失败次数，key: 播放列表ID
    pub commit_failures: Arc<DashMap<String, u64>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 记录一次写操作
    ///
    /// # 参数
    ///
    /// * `collection` - 集合名称
    /// * `kind` - 写操作类型（added/changed/removed）
    pub fn record_write(&self, collection: &str, kind: &str) {
        let key = format!("{}:{}", collection, kind);
        *self.writes_total.entry(key).or_insert(0) += 1;
    }

    /// 记录事务结果
    pub fn record_transaction(&self, playlist: &str, result: &str) {
        let span = span!(Level::DEBUG, "playout_transaction", playlist, result);
        let _enter = span.enter();
        *self.transactions_total.entry(result.to_string()).or_insert(0) += 1;
    }

    /// 记录锁等待耗时
    pub fn record_lock_wait(&self, priority: &str, duration_secs: f64) {
        let mut entry = self.lock_wait.entry(priority.to_string()).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 记录锁持有耗时
    pub fn record_lock_hold(&self, priority: &str, duration_secs: f64) {
        let mut entry = self.lock_hold.entry(priority.to_string()).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 设置锁等待队列长度
    pub fn set_queue_depth(&self, playlist: &str, depth: usize) {
        if depth == 0 {
            self.lock_queue_depth.remove(playlist);
        } else {
            self.lock_queue_depth.insert(playlist.to_string(), depth);
        }
    }

    /// 记录提交失败
    pub fn record_commit_failure(&self, playlist: &str) {
        *self.commit_failures.entry(playlist.to_string()).or_insert(0) += 1;
        self.record_transaction(playlist, "failed");
    }

    /// 读取事务结果计数
    pub fn transactions(&self, result: &str) -> u64 {
        self.transactions_total.get(result).map(|v| *v).unwrap_or(0)
    }

    /// 读取写操作计数
    pub fn writes(&self, collection: &str, kind: &str) -> u64 {
        self.writes_total
            .get(&format!("{}:{}", collection, kind))
            .map(|v| *v)
            .unwrap_or(0)
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为字符串返回，用于监控系统采集
///
/// # 返回值
///
/// 返回包含所有指标的字符串
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;

    let mut output = String::new();
    for entry in metrics.writes_total.iter() {
        let key = entry.key().as_str();
        let (collection, kind) = key.split_once(':').unwrap_or((key, ""));
        output.push_str(&format!(
            "playout_cache_writes_total{{collection=\"{}\", kind=\"{}\"}} {}\n",
            collection,
            kind,
            entry.value()
        ));
    }
    for entry in metrics.transactions_total.iter() {
        output.push_str(&format!(
            "playout_cache_transactions_total{{result=\"{}\"}} {}\n",
            entry.key(),
            entry.value()
        ));
    }
    for (name, map) in [
        ("playout_lock_wait_seconds", &metrics.lock_wait),
        ("playout_lock_hold_seconds", &metrics.lock_hold),
    ] {
        for entry in map.iter() {
            let (total, count) = *entry.value();
            output.push_str(&format!(
                "{}_sum{{priority=\"{}\"}} {}\n",
                name,
                entry.key(),
                total
            ));
            output.push_str(&format!(
                "{}_count{{priority=\"{}\"}} {}\n",
                name,
                entry.key(),
                count
            ));
        }
    }
    for entry in metrics.lock_queue_depth.iter() {
        output.push_str(&format!(
            "playout_lock_queue_depth{{playlist=\"{}\"}} {}\n",
            entry.key(),
            entry.value()
        ));
    }
    for entry in metrics.commit_failures.iter() {
        output.push_str(&format!(
            "playout_cache_commit_failures_total{{playlist=\"{}\"}} {}\n",
            entry.key(),
            entry.value()
        ));
    }
    output
}
