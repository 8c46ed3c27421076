//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了节目结构文档：播放列表、节目单、段落和部分。

use super::{
    CollectionName, Entity, PartId, PartInstanceId, PlaylistId, RundownId, SegmentId,
};
use serde::{Deserialize, Serialize};

/// 播放列表
///
/// 一个演播室当前加载用于播出的节目单集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: PlaylistId,
    pub name: String,
    pub studio_id: String,
    /// 激活ID，None 表示未激活
    pub activation_id: Option<String>,
    pub rehearsal: bool,
    /// 播放到末尾后是否回到开头
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub current_part_instance_id: Option<PartInstanceId>,
    pub next_part_instance_id: Option<PartInstanceId>,
    pub previous_part_instance_id: Option<PartInstanceId>,
    /// 手动指定的下一个段落
    pub next_segment_id: Option<SegmentId>,
}

impl Playlist {
    pub fn new(id: impl Into<PlaylistId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            studio_id: "studio0".to_string(),
            activation_id: None,
            rehearsal: false,
            loop_playback: false,
            current_part_instance_id: None,
            next_part_instance_id: None,
            previous_part_instance_id: None,
            next_segment_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation_id.is_some()
    }
}

impl Entity for Playlist {
    type Id = PlaylistId;
    const COLLECTION: CollectionName = CollectionName::Playlists;

    fn id(&self) -> &PlaylistId {
        &self.id
    }
}

/// 节目单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rundown {
    #[serde(rename = "_id")]
    pub id: RundownId,
    pub playlist_id: PlaylistId,
    pub name: String,
    /// 在播放列表中的顺序
    pub rank: f64,
}

impl Entity for Rundown {
    type Id = RundownId;
    const COLLECTION: CollectionName = CollectionName::Rundowns;

    fn id(&self) -> &RundownId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.playlist_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.rank
    }
}

/// 段落
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(rename = "_id")]
    pub id: SegmentId,
    pub rundown_id: RundownId,
    pub name: String,
    pub rank: f64,
    pub hidden: bool,
}

impl Entity for Segment {
    type Id = SegmentId;
    const COLLECTION: CollectionName = CollectionName::Segments;

    fn id(&self) -> &SegmentId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.rundown_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.rank
    }
}

/// 部分，可被 take 的最小单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(rename = "_id")]
    pub id: PartId,
    pub rundown_id: RundownId,
    pub segment_id: SegmentId,
    pub title: String,
    pub rank: f64,
    /// 内容无效，不可播出
    pub invalid: bool,
    /// 被浮动移出播出顺序
    pub floated: bool,
    pub expected_duration_ms: Option<u64>,
}

impl Part {
    /// 是否可以被选为下一个播出部分
    pub fn is_playable(&self) -> bool {
        !self.invalid && !self.floated
    }
}

impl Entity for Part {
    type Id = PartId;
    const COLLECTION: CollectionName = CollectionName::Parts;

    fn id(&self) -> &PartId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.segment_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.rank
    }
}
