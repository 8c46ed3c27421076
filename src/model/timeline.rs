//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了时间线文档。

use super::{CollectionName, Entity, PartInstanceId, PieceInstanceId, PlaylistId, TimelineId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 时间线对象，对应一个正在播出的片段实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineObject {
    pub id: String,
    pub layer: String,
    pub part_instance_id: PartInstanceId,
    pub piece_instance_id: PieceInstanceId,
    pub start_ms: u64,
    pub infinite: bool,
}

/// 时间线文档
///
/// 每个播放列表一份，ID 与播放列表ID相同
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDoc {
    #[serde(rename = "_id")]
    pub id: TimelineId,
    pub playlist_id: PlaylistId,
    pub generated_at: DateTime<Utc>,
    pub objects: Vec<TimelineObject>,
}

impl Entity for TimelineDoc {
    type Id = TimelineId;
    const COLLECTION: CollectionName = CollectionName::Timelines;

    fn id(&self) -> &TimelineId {
        &self.id
    }
}
