//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出管理器，负责按配置创建文档存储并在锁内执行播出操作。

use crate::cache::PlayoutSnapshot;
use crate::config::{Config, StoreKind};
use crate::error::{CacheError, Result};
use crate::lock::{LockPriority, PlayoutLockScheduler};
use crate::model::{CollectionName, PartId, PartInstanceId, PlaylistId, SegmentId};
use crate::playout::{self, TakeResult};
use crate::store::{DocumentStore, FileStore, MemoryStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// 有序视图中的部分摘要
#[derive(Debug, Clone, PartialEq)]
pub struct PartSummary {
    pub id: PartId,
    pub title: String,
    pub playable: bool,
}

/// 有序视图中的段落摘要
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub id: SegmentId,
    pub name: String,
    pub parts: Vec<PartSummary>,
}

/// 播出管理器
///
/// 持有进程内唯一的文档存储和锁调度器，所有播出操作都经由调度器串行执行
pub struct PlayoutManager {
    store: Arc<dyn DocumentStore>,
    scheduler: PlayoutLockScheduler,
    config: Config,
}

impl PlayoutManager {
    /// 根据配置创建管理器
    ///
    /// # 参数
    ///
    /// * `config` - 服务配置
    ///
    /// # 返回值
    ///
    /// 配置无效或文件存储无法打开时返回错误
    #[instrument(skip(config), level = "info", fields(store = ?config.store.kind))]
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        let store: Arc<dyn DocumentStore> = match config.store.kind {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::File => Arc::new(FileStore::open(&config.store.data_dir).await?),
        };
        info!("PlayoutManager initialized with {:?} store", config.store.kind);
        Ok(Self::with_store(store, config))
    }

    /// 使用已有的文档存储创建管理器
    pub fn with_store(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        let scheduler = PlayoutLockScheduler::with_config(Arc::clone(&store), config.lock.clone());
        Self {
            store,
            scheduler,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &PlayoutLockScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 将快照中的所有文档直接写入存储
    ///
    /// 按父子顺序逐条插入，用于初始化数据
    ///
    /// # 返回值
    ///
    /// 写入的文档数量
    pub async fn import_snapshot(&self, snapshot: &PlayoutSnapshot) -> Result<usize> {
        let mut written = 0;
        written += insert_all(&*self.store, CollectionName::Playlists, [&snapshot.playlist]).await?;
        written += insert_all(&*self.store, CollectionName::Rundowns, &snapshot.rundowns).await?;
        written += insert_all(&*self.store, CollectionName::Segments, &snapshot.segments).await?;
        written += insert_all(&*self.store, CollectionName::Parts, &snapshot.parts).await?;
        written +=
            insert_all(&*self.store, CollectionName::PartInstances, &snapshot.part_instances)
                .await?;
        written += insert_all(&*self.store, CollectionName::Pieces, &snapshot.pieces).await?;
        written += insert_all(
            &*self.store,
            CollectionName::PieceInstances,
            &snapshot.piece_instances,
        )
        .await?;
        written += insert_all(&*self.store, CollectionName::Timelines, &snapshot.timeline).await?;
        info!(
            "imported {} documents for playlist {}",
            written, snapshot.playlist.id
        );
        Ok(written)
    }

    /// 激活播放列表，返回选出的下一个部分实例
    pub async fn activate(
        &self,
        playlist_id: &PlaylistId,
        rehearsal: bool,
    ) -> Result<Option<PartInstanceId>> {
        self.scheduler
            .run_with_cache_sync(playlist_id, LockPriority::UserPlayout, move |cache| {
                playout::activate_playlist(cache, rehearsal)?;
                Ok(cache.playlist()?.next_part_instance_id.clone())
            })
            .await
    }

    pub async fn deactivate(&self, playlist_id: &PlaylistId) -> Result<()> {
        self.scheduler
            .run_with_cache_sync(
                playlist_id,
                LockPriority::UserPlayout,
                playout::deactivate_playlist,
            )
            .await
    }

    /// 手动设置下一个部分
    pub async fn set_next(
        &self,
        playlist_id: &PlaylistId,
        part_id: Option<PartId>,
    ) -> Result<Option<PartInstanceId>> {
        self.scheduler
            .run_with_cache_sync(playlist_id, LockPriority::UserPlayout, move |cache| {
                playout::set_next_part(cache, part_id.as_ref())
            })
            .await
    }

    pub async fn take(&self, playlist_id: &PlaylistId) -> Result<TakeResult> {
        self.scheduler
            .run_with_cache_sync(playlist_id, LockPriority::UserPlayout, playout::take)
            .await
    }

    /// 计算播出头之后的部分，`limit` 缺省时使用配置值
    pub async fn lookahead(
        &self,
        playlist_id: &PlaylistId,
        limit: Option<usize>,
    ) -> Result<Vec<PartId>> {
        let limit = limit.unwrap_or(self.config.lookahead.default_limit);
        self.scheduler
            .run_with_cache_sync(playlist_id, LockPriority::Callback, move |cache| {
                let parts = playout::parts_after_playhead(cache, limit)?
                    .into_iter()
                    .map(|part| part.id.clone())
                    .collect();
                cache.assert_no_changes()?;
                Ok(parts)
            })
            .await
    }

    /// 获取播出顺序视图的摘要
    pub async fn inspect(&self, playlist_id: &PlaylistId) -> Result<Vec<SegmentSummary>> {
        self.scheduler
            .run_with_cache_sync(playlist_id, LockPriority::Callback, |cache| {
                let ordered = playout::ordered_segments_and_parts(cache);
                Ok(ordered
                    .segments
                    .iter()
                    .map(|segment| SegmentSummary {
                        id: segment.segment.id.clone(),
                        name: segment.segment.name.clone(),
                        parts: segment
                            .parts
                            .iter()
                            .map(|part| PartSummary {
                                id: part.part.id.clone(),
                                title: part.part.title.clone(),
                                playable: part.playable,
                            })
                            .collect(),
                    })
                    .collect())
            })
            .await
    }
}

async fn insert_all<'a, T, I>(
    store: &dyn DocumentStore,
    collection: CollectionName,
    docs: I,
) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let docs = docs
        .into_iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let count = docs.len();
    for doc in docs {
        store.insert_one(collection, doc).await?;
    }
    Ok(count)
}
