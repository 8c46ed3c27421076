//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出数据模型：强类型ID、集合名称以及各类文档结构。

pub mod ids;
pub mod instances;
pub mod rundown;
pub mod timeline;

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;

pub use ids::*;
pub use instances::{
    OrphanedKind, PartInstance, Piece, PieceInstance, PieceInstanceInfinite, PieceLifespan,
};
pub use rundown::{Part, Playlist, Rundown, Segment};
pub use timeline::{TimelineDoc, TimelineObject};

/// 文档主键字段名
pub const ID_FIELD: &str = "_id";

/// 实体ID特征
pub trait EntityId:
    Clone + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static
{
    /// 获取ID的字符串形式
    fn as_str(&self) -> &str;
}

/// 集合名称
///
/// 文档存储中的每个集合对应一种实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionName {
    Playlists,
    Rundowns,
    Segments,
    Parts,
    PartInstances,
    Pieces,
    PieceInstances,
    Timelines,
}

impl CollectionName {
    /// 提交顺序：父集合在子集合之前
    pub const COMMIT_ORDER: [CollectionName; 8] = [
        CollectionName::Playlists,
        CollectionName::Rundowns,
        CollectionName::Segments,
        CollectionName::Parts,
        CollectionName::PartInstances,
        CollectionName::Pieces,
        CollectionName::PieceInstances,
        CollectionName::Timelines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Playlists => "rundownPlaylists",
            CollectionName::Rundowns => "rundowns",
            CollectionName::Segments => "segments",
            CollectionName::Parts => "parts",
            CollectionName::PartInstances => "partInstances",
            CollectionName::Pieces => "pieces",
            CollectionName::PieceInstances => "pieceInstances",
            CollectionName::Timelines => "timeline",
        }
    }

    /// 根据名称解析集合
    pub fn parse(name: &str) -> Option<Self> {
        Self::COMMIT_ORDER
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
    }
}

impl Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持久化实体特征
///
/// 所有可被 `EntityCache` 缓存的文档都需要实现此特征
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 实体ID类型
    type Id: EntityId;

    /// 实体所属集合
    const COLLECTION: CollectionName;

    /// 获取实体ID
    fn id(&self) -> &Self::Id;

    /// 分组索引键（通常是父实体ID）
    fn group_key(&self) -> Option<&str> {
        None
    }

    /// 组内排序值
    fn rank(&self) -> f64 {
        0.0
    }
}
