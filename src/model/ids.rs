//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了各实体类型的强类型ID。

use super::EntityId;

/// 定义一个实体ID新类型
///
/// 每种实体使用独立的ID类型，在编译期防止跨集合混用ID
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// 由字符串创建ID
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// 生成随机ID
            pub fn new_random() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl EntityId for $name {
            fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// 播放列表ID，同时也是锁调度器的键
    PlaylistId
);
define_id!(RundownId);
define_id!(SegmentId);
define_id!(PartId);
define_id!(PartInstanceId);
define_id!(PieceId);
define_id!(PieceInstanceId);
define_id!(
    /// 时间线文档ID
    TimelineId
);

impl From<&PlaylistId> for TimelineId {
    fn from(id: &PlaylistId) -> Self {
        TimelineId::new(id.as_str())
    }
}
