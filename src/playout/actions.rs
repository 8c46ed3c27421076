//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了在锁内执行的播出操作：激活、设置下一个部分、take 和停用。

use super::infinites::continuing_infinites;
use super::ordering::{ordered_segments_and_parts, parts_after_playhead};
use super::timeline::update_timeline;
use crate::cache::PlayoutCache;
use crate::error::{CacheError, Result};
use crate::model::{CollectionName, PartId, PartInstance, PartInstanceId, PieceInstance};
use chrono::Utc;
use tracing::{debug, info};

/// take 操作的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeResult {
    /// 新的当前部分实例
    pub current: PartInstanceId,
    /// 自动选出的下一个部分实例，播出到末尾时为 None
    pub next: Option<PartInstanceId>,
}

/// 激活播放列表
///
/// 生成新的激活ID，将之前的所有实例标记为已重置，并选择第一个可播出部分作为下一个
///
/// # 参数
///
/// * `cache` - 播出缓存
/// * `rehearsal` - 是否为彩排模式
///
/// # 返回值
///
/// 播放列表已激活时返回 `Playout` 错误
pub fn activate_playlist(cache: &mut PlayoutCache, rehearsal: bool) -> Result<()> {
    if cache.playlist()?.is_active() {
        return Err(CacheError::Playout(format!(
            "playlist {} is already active",
            cache.playlist_id()
        )));
    }

    let activation_id = uuid::Uuid::new_v4().simple().to_string();
    reset_instances(cache)?;
    cache.update_playlist(|playlist| {
        playlist.activation_id = Some(activation_id.clone());
        playlist.rehearsal = rehearsal;
        playlist.current_part_instance_id = None;
        playlist.next_part_instance_id = None;
        playlist.previous_part_instance_id = None;
    })?;

    let first = parts_after_playhead(cache, 1)?
        .first()
        .map(|part| part.id.clone());
    set_next_part(cache, first.as_ref())?;
    cache.defer(update_timeline);

    info!(
        "activated playlist {} (activation {}, rehearsal: {})",
        cache.playlist_id(),
        activation_id,
        rehearsal
    );
    Ok(())
}

/// 停用播放列表
///
/// 清除激活ID和播出指针，时间线在提交前被清空
pub fn deactivate_playlist(cache: &mut PlayoutCache) -> Result<()> {
    if !cache.playlist()?.is_active() {
        return Err(CacheError::Playout(format!(
            "playlist {} is not active",
            cache.playlist_id()
        )));
    }

    reset_instances(cache)?;
    cache.update_playlist(|playlist| {
        playlist.activation_id = None;
        playlist.rehearsal = false;
        playlist.current_part_instance_id = None;
        playlist.next_part_instance_id = None;
        playlist.previous_part_instance_id = None;
        playlist.next_segment_id = None;
    })?;
    cache.defer(update_timeline);

    info!("deactivated playlist {}", cache.playlist_id());
    Ok(())
}

/// 设置下一个部分
///
/// 尚未播出的旧的下一个实例及其片段实例会被丢弃。新实例带上部分的计划片段，
/// 以及从当前实例延续而来的无限片段。
///
/// # 参数
///
/// * `cache` - 播出缓存
/// * `part_id` - 下一个部分，None 表示清除
///
/// # 返回值
///
/// 新建的部分实例ID；播放列表未激活或部分不可播出时返回 `Playout` 错误
pub fn set_next_part(
    cache: &mut PlayoutCache,
    part_id: Option<&PartId>,
) -> Result<Option<PartInstanceId>> {
    let playlist = cache.playlist()?;
    let Some(activation_id) = playlist.activation_id.clone() else {
        return Err(CacheError::Playout(format!(
            "playlist {} is not active",
            playlist.id
        )));
    };

    if let Some(old) = playlist.next_part_instance_id.clone() {
        let untaken = cache
            .part_instances
            .find_one(&old)
            .map(|instance| instance.planned_started_at.is_none())
            .unwrap_or(false);
        if untaken {
            cache
                .piece_instances
                .remove_where(|pi| pi.part_instance_id == old);
            cache.part_instances.remove(&old)?;
        }
    }

    let Some(part_id) = part_id else {
        cache.update_playlist(|playlist| playlist.next_part_instance_id = None)?;
        return Ok(None);
    };

    let part = cache
        .parts
        .find_one(part_id)
        .cloned()
        .ok_or_else(|| CacheError::not_found(CollectionName::Parts, part_id))?;
    if !part.is_playable() {
        return Err(CacheError::Playout(format!(
            "part {} is not playable",
            part.id
        )));
    }

    let take_count = cache
        .current_part_instance()
        .map(|current| current.take_count + 1)
        .unwrap_or(0);
    let instance = PartInstance::from_part(&part, &activation_id, take_count);

    let mut piece_instances: Vec<PieceInstance> = cache
        .pieces
        .find_in_group(part.id.as_str())
        .into_iter()
        .filter(|piece| !piece.invalid)
        .map(|piece| PieceInstance::from_piece(piece, &instance))
        .collect();
    let ordered = ordered_segments_and_parts(cache);
    piece_instances.extend(continuing_infinites(
        cache,
        &ordered,
        cache.current_part_instance(),
        &instance,
    )?);

    let instance_id = cache.part_instances.insert(instance)?;
    for piece_instance in piece_instances {
        cache.piece_instances.insert(piece_instance)?;
    }
    cache.update_playlist(|playlist| {
        playlist.next_part_instance_id = Some(instance_id.clone());
        if playlist.next_segment_id.as_ref() == Some(&part.segment_id) {
            playlist.next_segment_id = None;
        }
    })?;

    debug!("set next part {} as {}", part.id, instance_id);
    Ok(Some(instance_id))
}

/// 将下一个部分提升为当前部分
///
/// 记录开始时间并自动选出新的下一个部分。时间线在提交前重新生成，
/// 提交完成后输出一条日志
pub fn take(cache: &mut PlayoutCache) -> Result<TakeResult> {
    let playlist = cache.playlist()?;
    if !playlist.is_active() {
        return Err(CacheError::Playout(format!(
            "playlist {} is not active",
            playlist.id
        )));
    }
    let Some(taken) = playlist.next_part_instance_id.clone() else {
        return Err(CacheError::Playout(format!(
            "playlist {} has no next part",
            playlist.id
        )));
    };
    let previous_current = playlist.current_part_instance_id.clone();

    let now = Utc::now();
    cache
        .part_instances
        .update_with(&taken, |instance| instance.planned_started_at = Some(now))?;
    cache.update_playlist(|playlist| {
        playlist.previous_part_instance_id = previous_current;
        playlist.current_part_instance_id = Some(taken.clone());
        playlist.next_part_instance_id = None;
    })?;

    let following = parts_after_playhead(cache, 1)?
        .first()
        .map(|part| part.id.clone());
    let next = set_next_part(cache, following.as_ref())?;
    cache.defer(update_timeline);

    let playlist_id = cache.playlist_id().clone();
    let current = taken.clone();
    cache.defer_after_save(move |_| {
        info!("took {} on playlist {}", current, playlist_id);
        Ok(())
    });

    Ok(TakeResult {
        current: taken,
        next,
    })
}

fn reset_instances(cache: &mut PlayoutCache) -> Result<()> {
    cache
        .part_instances
        .update_all_with(|pi| !pi.reset, |pi| pi.reset = true)?;
    cache
        .piece_instances
        .update_all_with(|pi| !pi.reset, |pi| pi.reset = true)?;
    Ok(())
}
