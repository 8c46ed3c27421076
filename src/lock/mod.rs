//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按播放列表串行化播出操作的锁调度器。

pub mod priority;
mod queue;
pub mod scheduler;

pub use priority::LockPriority;
pub use scheduler::PlayoutLockScheduler;
