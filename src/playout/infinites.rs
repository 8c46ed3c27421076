//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了无限片段跨部分延续的判断和生成。

use super::ordering::OrderedPlayback;
use crate::cache::PlayoutCache;
use crate::error::Result;
use crate::model::{PartInstance, PieceInstance, PieceInstanceId, PieceLifespan, Playlist};
use std::collections::HashSet;
use tracing::trace;

/// 判断无限片段能否从上一个部分实例延续到候选部分实例
///
/// 候选实例在播出顺序中必须严格位于上一个实例之后，跨段落、跨节目单同样成立。
/// 孤立实例按其小数 rank 参与比较。
///
/// # 参数
///
/// * `playlist` - 播放列表
/// * `ordered` - 播出顺序视图
/// * `previous` - 上一个部分实例，没有时直接返回 false
/// * `candidate` - 候选部分实例
pub fn can_continue_infinite_across(
    playlist: &Playlist,
    ordered: &OrderedPlayback<'_>,
    previous: Option<&PartInstance>,
    candidate: &PartInstance,
) -> bool {
    let Some(previous) = previous else {
        return false;
    };

    // 不同激活周期的实例之间不延续
    if let Some(activation_id) = &playlist.activation_id {
        if previous.playlist_activation_id != *activation_id
            || candidate.playlist_activation_id != *activation_id
        {
            return false;
        }
    }

    match (
        ordered.instance_position(previous),
        ordered.instance_position(candidate),
    ) {
        (Some(previous_position), Some(candidate_position)) => {
            candidate_position > previous_position
        }
        _ => false,
    }
}

/// 生成从上一个部分实例延续到候选实例的无限片段实例
///
/// 生成的片段实例尚未写入缓存。候选部分在同一源层上有计划片段时，
/// 计划片段优先，不再延续
pub fn continuing_infinites(
    cache: &PlayoutCache,
    ordered: &OrderedPlayback<'_>,
    previous: Option<&PartInstance>,
    candidate: &PartInstance,
) -> Result<Vec<PieceInstance>> {
    let playlist = cache.playlist()?;
    if !can_continue_infinite_across(playlist, ordered, previous, candidate) {
        return Ok(Vec::new());
    }
    let Some(previous) = previous else {
        return Ok(Vec::new());
    };

    let same_segment = previous.segment_id == candidate.segment_id;
    let same_rundown = previous.rundown_id == candidate.rundown_id;

    let planned_layers: HashSet<&str> = cache
        .pieces
        .find_in_group(candidate.part_id().as_str())
        .into_iter()
        .filter(|piece| !piece.invalid)
        .map(|piece| piece.source_layer_id.as_str())
        .collect();

    let mut continued = Vec::new();
    for instance in cache
        .piece_instances
        .find_in_group(previous.id.as_str())
    {
        let Some(infinite) = &instance.infinite else {
            continue;
        };
        if instance.disabled || instance.reset {
            continue;
        }

        let allowed = match instance.piece.lifespan {
            PieceLifespan::WithinPart => false,
            PieceLifespan::OutOnSegmentChange | PieceLifespan::OutOnSegmentEnd => same_segment,
            PieceLifespan::OutOnRundownChange | PieceLifespan::OutOnRundownEnd => same_rundown,
            PieceLifespan::OutOnShowStyleEnd => true,
        };
        if !allowed || planned_layers.contains(instance.piece.source_layer_id.as_str()) {
            continue;
        }

        trace!(
            "continuing infinite {} into {}",
            infinite.infinite_instance_id,
            candidate.id
        );
        let mut next = instance.clone();
        next.id = PieceInstanceId::new(format!("{}_{}", candidate.id, instance.piece.id));
        next.rundown_id = candidate.rundown_id.clone();
        next.part_instance_id = candidate.id.clone();
        if let Some(info) = next.infinite.as_mut() {
            info.from_previous_part = true;
        }
        continued.push(next);
    }
    Ok(continued)
}
