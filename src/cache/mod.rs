//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写回式事务缓存：单集合实体缓存、修改器以及播出缓存聚合。

pub mod aggregate;
pub mod entity_cache;
pub mod modifier;

pub use aggregate::{AfterSaveFn, DeferredFn, PlayoutCache, PlayoutSnapshot, SaveSummary};
pub use entity_cache::{CacheEntry, DirtyState, EntityCache};
pub use modifier::Modifier;
