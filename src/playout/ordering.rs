//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了段落和部分的播出顺序计算以及播出头之后的预读。

use crate::cache::PlayoutCache;
use crate::error::Result;
use crate::model::{Part, PartId, PartInstance, Segment, SegmentId};

/// 有序视图中的部分
#[derive(Debug, Clone, Copy)]
pub struct OrderedPart<'a> {
    pub part: &'a Part,
    /// 所在段落在有序视图中的下标
    pub segment_index: usize,
    /// 无效、浮动或所在段落被隐藏时为 false
    pub playable: bool,
}

/// 有序视图中的段落
#[derive(Debug, Clone)]
pub struct OrderedSegment<'a> {
    pub segment: &'a Segment,
    pub parts: Vec<OrderedPart<'a>>,
}

/// 播出顺序视图
///
/// 由已加载的缓存即时计算，不会被持久化
#[derive(Debug, Clone, Default)]
pub struct OrderedPlayback<'a> {
    pub segments: Vec<OrderedSegment<'a>>,
}

impl<'a> OrderedPlayback<'a> {
    /// 按播出顺序遍历所有部分
    pub fn parts(&self) -> impl Iterator<Item = &OrderedPart<'a>> + '_ {
        self.segments.iter().flat_map(|s| s.parts.iter())
    }

    /// 按播出顺序排列的部分ID
    pub fn part_ids(&self) -> Vec<&'a PartId> {
        self.parts().map(|p| &p.part.id).collect()
    }

    pub fn part_count(&self) -> usize {
        self.segments.iter().map(|s| s.parts.len()).sum()
    }

    pub fn segment_index(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.segment.id == *id)
    }

    /// 部分在展开后的播出序列中的下标
    pub fn part_index(&self, id: &PartId) -> Option<usize> {
        self.parts().position(|p| p.part.id == *id)
    }

    /// 部分实例在播出顺序中的位置
    ///
    /// 位置为 `(段落下标, rank, 是否孤立)`。孤立实例（例如临时插入的部分）
    /// 以其快照中的小数 rank 占据两个计划部分之间的位置，同 rank 时排在计划部分之后
    pub fn instance_position(&self, instance: &PartInstance) -> Option<(usize, f64, u8)> {
        let segment_index = self.segment_index(&instance.segment_id)?;
        let orphaned = u8::from(instance.orphaned.is_some());
        Some((segment_index, instance.part.rank, orphaned))
    }
}

/// 计算段落和部分的播出顺序
///
/// 节目单按 rank 排列，段落在节目单内按 rank 排列，部分在段落内按 rank 排列。
/// 不可播出的部分保留在结果中，只是标记为 `playable = false`
pub fn ordered_segments_and_parts(cache: &PlayoutCache) -> OrderedPlayback<'_> {
    let mut segments = Vec::new();
    for rundown in cache.rundowns.find_in_group(cache.playlist_id().as_str()) {
        for segment in cache.segments.find_in_group(rundown.id.as_str()) {
            let segment_index = segments.len();
            let parts = cache
                .parts
                .find_in_group(segment.id.as_str())
                .into_iter()
                .map(|part| OrderedPart {
                    part,
                    segment_index,
                    playable: part.is_playable() && !segment.hidden,
                })
                .collect();
            segments.push(OrderedSegment { segment, parts });
        }
    }
    OrderedPlayback { segments }
}

/// 计算播出头之后将要播出的部分
///
/// 从下一个（没有时为当前）部分实例之后开始向后遍历：
/// - 跳过不可播出的部分
/// - 播放列表指定了 `next_segment_id` 时，离开起始段落后跳转到该段落的第一个部分
/// - 到达末尾时，若仍有未生效的段落跳转则跳转过去；否则若设置了循环则回到开头，否则停止
/// - 每个部分在一次调用中最多出现一次
///
/// # 参数
///
/// * `cache` - 已加载的播出缓存
/// * `limit` - 最多返回的部分数量
pub fn parts_after_playhead(cache: &PlayoutCache, limit: usize) -> Result<Vec<&Part>> {
    let playlist = cache.playlist()?;
    let ordered = ordered_segments_and_parts(cache);
    let flat: Vec<&OrderedPart<'_>> = ordered.parts().collect();
    if flat.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let anchor = cache
        .next_part_instance()
        .or_else(|| cache.current_part_instance());
    let (mut index, start_segment) = match anchor {
        Some(instance) => (start_index(&ordered, &flat, instance), Some(&instance.segment_id)),
        None => (0, None),
    };

    let mut segment_override = playlist.next_segment_id.as_ref();
    let mut visited = vec![false; flat.len()];
    let mut result = Vec::with_capacity(limit);
    while result.len() < limit {
        if index >= flat.len() {
            // 到达末尾时优先跳转到指定段落，其次才考虑循环
            if let Some(jump) = segment_override
                .take()
                .and_then(|target| segment_start(&flat, target))
            {
                index = jump;
                continue;
            }
            if !playlist.loop_playback {
                break;
            }
            index = 0;
        }
        // 每个部分最多出现一次
        if visited[index] {
            break;
        }
        let candidate = flat[index];

        if let Some(target) = segment_override {
            if start_segment != Some(&candidate.part.segment_id) {
                segment_override = None;
                if let Some(jump) = segment_start(&flat, target) {
                    if jump != index {
                        index = jump;
                        continue;
                    }
                }
            }
        }

        visited[index] = true;
        if candidate.playable {
            result.push(candidate.part);
        }
        index += 1;
    }
    Ok(result)
}

/// 段落第一个部分在展开序列中的下标
fn segment_start(flat: &[&OrderedPart<'_>], segment_id: &SegmentId) -> Option<usize> {
    flat.iter().position(|p| p.part.segment_id == *segment_id)
}

/// 计算遍历起点：实例对应部分的下一个位置
fn start_index(
    ordered: &OrderedPlayback<'_>,
    flat: &[&OrderedPart<'_>],
    instance: &PartInstance,
) -> usize {
    if instance.orphaned.is_none() {
        if let Some(pos) = flat.iter().position(|p| p.part.id == *instance.part_id()) {
            return pos + 1;
        }
    }
    // 孤立实例：从第一个排在它后面的计划部分开始
    // 所在段落不在视图中时视为已到末尾
    let Some(position) = ordered.instance_position(instance) else {
        return flat.len();
    };
    flat.iter()
        .position(|p| (p.segment_index, p.part.rank, 0u8) > position)
        .unwrap_or(flat.len())
}
