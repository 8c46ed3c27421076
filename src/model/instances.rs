//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出实例文档：部分实例、片段以及片段实例。

use super::{
    CollectionName, Entity, Part, PartId, PartInstanceId, PieceId, PieceInstanceId, RundownId,
    SegmentId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 孤立实例的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanedKind {
    /// 临时插入的部分，没有对应的计划部分
    AdlibPart,
    /// 对应的计划部分已被删除
    Deleted,
}

/// 部分实例
///
/// 部分成为当前或下一个时创建的播出副本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInstance {
    #[serde(rename = "_id")]
    pub id: PartInstanceId,
    pub playlist_activation_id: String,
    pub rundown_id: RundownId,
    pub segment_id: SegmentId,
    /// 部分的快照，临时插入时其 rank 可以是小数
    pub part: Part,
    pub orphaned: Option<OrphanedKind>,
    pub reset: bool,
    pub take_count: u32,
    pub planned_started_at: Option<DateTime<Utc>>,
}

impl PartInstance {
    /// 基于计划部分创建实例
    pub fn from_part(part: &Part, activation_id: &str, take_count: u32) -> Self {
        Self {
            id: PartInstanceId::new(format!("{}_{}", part.id, PartInstanceId::new_random())),
            playlist_activation_id: activation_id.to_string(),
            rundown_id: part.rundown_id.clone(),
            segment_id: part.segment_id.clone(),
            part: part.clone(),
            orphaned: None,
            reset: false,
            take_count,
            planned_started_at: None,
        }
    }

    pub fn part_id(&self) -> &PartId {
        &self.part.id
    }
}

impl Entity for PartInstance {
    type Id = PartInstanceId;
    const COLLECTION: CollectionName = CollectionName::PartInstances;

    fn id(&self) -> &PartInstanceId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.segment_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.part.rank
    }
}

/// 片段生命周期
///
/// 决定无限片段在部分、段落、节目单边界之后是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceLifespan {
    #[serde(rename = "part-only")]
    WithinPart,
    #[serde(rename = "segment-change")]
    OutOnSegmentChange,
    #[serde(rename = "segment-end")]
    OutOnSegmentEnd,
    #[serde(rename = "rundown-change")]
    OutOnRundownChange,
    #[serde(rename = "rundown-end")]
    OutOnRundownEnd,
    #[serde(rename = "showstyle-end")]
    OutOnShowStyleEnd,
}

impl PieceLifespan {
    pub fn is_infinite(&self) -> bool {
        !matches!(self, PieceLifespan::WithinPart)
    }
}

/// 片段，部分上的一个可播出元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    #[serde(rename = "_id")]
    pub id: PieceId,
    pub start_rundown_id: RundownId,
    pub start_segment_id: SegmentId,
    pub start_part_id: PartId,
    pub name: String,
    pub source_layer_id: String,
    pub lifespan: PieceLifespan,
    pub start_ms: u64,
    pub invalid: bool,
}

impl Entity for Piece {
    type Id = PieceId;
    const COLLECTION: CollectionName = CollectionName::Pieces;

    fn id(&self) -> &PieceId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.start_part_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.start_ms as f64
    }
}

/// 片段实例的无限延续信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceInstanceInfinite {
    /// 同一无限片段在各部分实例之间共享的ID
    pub infinite_instance_id: String,
    pub infinite_piece_id: PieceId,
    /// 是否由前一个部分实例延续而来
    pub from_previous_part: bool,
}

/// 片段实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceInstance {
    #[serde(rename = "_id")]
    pub id: PieceInstanceId,
    pub rundown_id: RundownId,
    pub part_instance_id: PartInstanceId,
    pub piece: Piece,
    pub infinite: Option<PieceInstanceInfinite>,
    pub reset: bool,
    pub disabled: bool,
}

impl PieceInstance {
    /// 为部分实例创建片段实例
    pub fn from_piece(piece: &Piece, part_instance: &PartInstance) -> Self {
        let id = PieceInstanceId::new(format!("{}_{}", part_instance.id, piece.id));
        let infinite = piece.lifespan.is_infinite().then(|| PieceInstanceInfinite {
            infinite_instance_id: id.to_string(),
            infinite_piece_id: piece.id.clone(),
            from_previous_part: false,
        });
        Self {
            id,
            rundown_id: part_instance.rundown_id.clone(),
            part_instance_id: part_instance.id.clone(),
            piece: piece.clone(),
            infinite,
            reset: false,
            disabled: false,
        }
    }
}

impl Entity for PieceInstance {
    type Id = PieceInstanceId;
    const COLLECTION: CollectionName = CollectionName::PieceInstances;

    fn id(&self) -> &PieceInstanceId {
        &self.id
    }

    fn group_key(&self) -> Option<&str> {
        Some(self.part_instance_id.as_str())
    }

    fn rank(&self) -> f64 {
        self.piece.start_ms as f64
    }
}
