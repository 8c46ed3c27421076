//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于已加载缓存的播出算法和播出操作。

pub mod actions;
pub mod infinites;
pub mod ordering;
pub mod timeline;

pub use actions::{activate_playlist, deactivate_playlist, set_next_part, take, TakeResult};
pub use infinites::{can_continue_infinite_across, continuing_infinites};
pub use ordering::{
    ordered_segments_and_parts, parts_after_playhead, OrderedPart, OrderedPlayback,
    OrderedSegment,
};
pub use timeline::update_timeline;
