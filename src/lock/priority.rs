//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出锁的优先级。

use serde::Deserialize;

/// 锁优先级
///
/// 数值越小越先被放行，具体数值不属于约定，只有相对顺序有意义
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPriority {
    /// 操作员的播出操作（take、激活等）
    UserPlayout = 0,
    /// 播出设备回调
    Callback = 1,
    /// 节目单导入
    Ingest = 2,
    /// 后台清理
    Housekeeping = 3,
}

impl LockPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockPriority::UserPlayout => "UserPlayout",
            LockPriority::Callback => "Callback",
            LockPriority::Ingest => "Ingest",
            LockPriority::Housekeeping => "Housekeeping",
        }
    }
}

impl std::fmt::Display for LockPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
