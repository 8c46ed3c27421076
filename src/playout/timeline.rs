//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了时间线的重新生成。

use crate::cache::PlayoutCache;
use crate::error::Result;
use crate::model::{TimelineDoc, TimelineId, TimelineObject};
use chrono::Utc;
use tracing::debug;

/// 根据当前部分实例重新生成播放列表的时间线
///
/// 播放列表未激活或没有当前部分时，时间线为空
pub fn update_timeline(cache: &mut PlayoutCache) -> Result<()> {
    let playlist = cache.playlist()?;
    let playlist_id = playlist.id.clone();
    let active = playlist.is_active();

    let objects: Vec<TimelineObject> = match cache.current_part_instance() {
        Some(current) if active => cache
            .piece_instances
            .find_in_group(current.id.as_str())
            .into_iter()
            .filter(|pi| !pi.disabled && !pi.reset)
            .map(|pi| TimelineObject {
                id: format!("piece_{}", pi.id),
                layer: pi.piece.source_layer_id.clone(),
                part_instance_id: current.id.clone(),
                piece_instance_id: pi.id.clone(),
                start_ms: pi.piece.start_ms,
                infinite: pi.infinite.is_some(),
            })
            .collect(),
        _ => Vec::new(),
    };

    debug!(
        "regenerated timeline for {} with {} objects",
        playlist_id,
        objects.len()
    );
    cache.timeline.upsert(TimelineDoc {
        id: TimelineId::from(&playlist_id),
        playlist_id,
        generated_at: Utc::now(),
        objects,
    });
    Ok(())
}
