//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出缓存聚合，将一个播放列表涉及的所有实体缓存组合在一次提交中。

use super::entity_cache::EntityCache;
use crate::error::{CacheError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::model::{
    CollectionName, Part, PartInstance, Piece, PieceInstance, Playlist, PlaylistId, Rundown,
    Segment, TimelineDoc,
};
use crate::store::{DocumentStore, Filter, WriteOp};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 提交前执行的延迟回调，可以继续修改缓存
pub type DeferredFn = Box<dyn FnOnce(&mut PlayoutCache) -> Result<()> + Send>;

/// 提交后执行的延迟回调，此时所有写入都已完成
pub type AfterSaveFn = Box<dyn FnOnce(&PlayoutCache) -> Result<()> + Send>;

/// 用于直接构造缓存的文档集合
///
/// 主要用于测试以及不经过存储的离线计算
#[derive(Debug, Clone)]
pub struct PlayoutSnapshot {
    pub playlist: Playlist,
    pub rundowns: Vec<Rundown>,
    pub segments: Vec<Segment>,
    pub parts: Vec<Part>,
    pub part_instances: Vec<PartInstance>,
    pub pieces: Vec<Piece>,
    pub piece_instances: Vec<PieceInstance>,
    pub timeline: Option<TimelineDoc>,
}

impl PlayoutSnapshot {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            playlist,
            rundowns: Vec::new(),
            segments: Vec::new(),
            parts: Vec::new(),
            part_instances: Vec::new(),
            pieces: Vec::new(),
            piece_instances: Vec::new(),
            timeline: None,
        }
    }
}

/// 一次提交的写入统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveSummary {
    /// 按提交顺序记录各集合的写入数量
    pub collections: Vec<(CollectionName, usize)>,
}

impl SaveSummary {
    /// 总写入数量
    pub fn total_writes(&self) -> usize {
        self.collections.iter().map(|(_, n)| n).sum()
    }

    pub fn writes_for(&self, collection: CollectionName) -> usize {
        self.collections
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// 播出缓存聚合
///
/// 在锁内从存储加载一个播放列表的快照，操作闭包只修改内存中的数据，
/// 成功后由 [`PlayoutCache::save_all_to_database`] 统一写回
pub struct PlayoutCache {
    playlist_id: PlaylistId,
    pub playlist: EntityCache<Playlist>,
    pub rundowns: EntityCache<Rundown>,
    pub segments: EntityCache<Segment>,
    pub parts: EntityCache<Part>,
    pub part_instances: EntityCache<PartInstance>,
    pub pieces: EntityCache<Piece>,
    pub piece_instances: EntityCache<PieceInstance>,
    pub timeline: EntityCache<TimelineDoc>,
    deferred: VecDeque<DeferredFn>,
    deferred_after_save: VecDeque<AfterSaveFn>,
}

impl std::fmt::Debug for PlayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayoutCache")
            .field("playlist_id", &self.playlist_id)
            .field("rundowns", &self.rundowns.len())
            .field("segments", &self.segments.len())
            .field("parts", &self.parts.len())
            .field("part_instances", &self.part_instances.len())
            .field("piece_instances", &self.piece_instances.len())
            .field("deferred", &self.deferred.len())
            .field("deferred_after_save", &self.deferred_after_save.len())
            .finish()
    }
}

impl PlayoutCache {
    /// 从文档存储加载播放列表的快照
    ///
    /// # 参数
    ///
    /// * `store` - 文档存储
    /// * `playlist_id` - 播放列表ID
    ///
    /// # 返回值
    ///
    /// 播放列表不存在时返回 `NotFound`
    #[instrument(skip(store), level = "debug", fields(playlist = %playlist_id))]
    pub async fn load(store: &dyn DocumentStore, playlist_id: &PlaylistId) -> Result<Self> {
        let started = Instant::now();
        let playlist = EntityCache::<Playlist>::load_one(store, playlist_id.as_str()).await?;
        if playlist.find_one(playlist_id).is_none() {
            return Err(CacheError::not_found(CollectionName::Playlists, playlist_id));
        }

        let rundowns =
            EntityCache::<Rundown>::load(store, &Filter::eq("playlistId", playlist_id.as_str()))
                .await?;
        let rundown_ids: Vec<String> = rundowns.iter().map(|r| r.id.to_string()).collect();

        let by_rundown = Filter::in_values("rundownId", rundown_ids.clone());
        let live_by_rundown = by_rundown.clone().and(Filter::ne("reset", true));
        let pieces_filter = Filter::in_values("startRundownId", rundown_ids);

        let (segments, parts, part_instances, pieces, piece_instances, timeline) = tokio::try_join!(
            EntityCache::<Segment>::load(store, &by_rundown),
            EntityCache::<Part>::load(store, &by_rundown),
            EntityCache::<PartInstance>::load(store, &live_by_rundown),
            EntityCache::<Piece>::load(store, &pieces_filter),
            EntityCache::<PieceInstance>::load(store, &live_by_rundown),
            EntityCache::<TimelineDoc>::load_one(store, playlist_id.as_str()),
        )?;

        debug!(
            "loaded playlist {} in {:?}: {} rundowns, {} segments, {} parts",
            playlist_id,
            started.elapsed(),
            rundowns.len(),
            segments.len(),
            parts.len()
        );

        Ok(Self {
            playlist_id: playlist_id.clone(),
            playlist,
            rundowns,
            segments,
            parts,
            part_instances,
            pieces,
            piece_instances,
            timeline,
            deferred: VecDeque::new(),
            deferred_after_save: VecDeque::new(),
        })
    }

    /// 由内存中的文档直接构造缓存，所有文档都视为已加载的基线
    pub fn from_snapshot(snapshot: PlayoutSnapshot) -> Self {
        Self {
            playlist_id: snapshot.playlist.id.clone(),
            playlist: EntityCache::from_documents(vec![snapshot.playlist]),
            rundowns: EntityCache::from_documents(snapshot.rundowns),
            segments: EntityCache::from_documents(snapshot.segments),
            parts: EntityCache::from_documents(snapshot.parts),
            part_instances: EntityCache::from_documents(snapshot.part_instances),
            pieces: EntityCache::from_documents(snapshot.pieces),
            piece_instances: EntityCache::from_documents(snapshot.piece_instances),
            timeline: EntityCache::from_documents(snapshot.timeline),
            deferred: VecDeque::new(),
            deferred_after_save: VecDeque::new(),
        }
    }

    pub fn playlist_id(&self) -> &PlaylistId {
        &self.playlist_id
    }

    /// 获取播放列表文档
    pub fn playlist(&self) -> Result<&Playlist> {
        self.playlist
            .find_one(&self.playlist_id)
            .ok_or_else(|| CacheError::not_found(CollectionName::Playlists, &self.playlist_id))
    }

    /// 修改播放列表文档
    pub fn update_playlist<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Playlist),
    {
        let id = self.playlist_id.clone();
        self.playlist.update_with(&id, f)
    }

    /// 当前正在播出的部分实例
    pub fn current_part_instance(&self) -> Option<&PartInstance> {
        let id = self.playlist().ok()?.current_part_instance_id.as_ref()?;
        self.part_instances.find_one(id)
    }

    /// 下一个部分实例
    pub fn next_part_instance(&self) -> Option<&PartInstance> {
        let id = self.playlist().ok()?.next_part_instance_id.as_ref()?;
        self.part_instances.find_one(id)
    }

    /// 上一个部分实例
    pub fn previous_part_instance(&self) -> Option<&PartInstance> {
        let id = self.playlist().ok()?.previous_part_instance_id.as_ref()?;
        self.part_instances.find_one(id)
    }

    /// 登记提交前回调
    ///
    /// 回调按登记顺序在写入之前执行，此时存储尚未发生任何变化
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut PlayoutCache) -> Result<()> + Send + 'static,
    {
        self.deferred.push_back(Box::new(f));
    }

    /// 登记提交后回调
    ///
    /// 回调按登记顺序在所有写入完成之后执行
    pub fn defer_after_save<F>(&mut self, f: F)
    where
        F: FnOnce(&PlayoutCache) -> Result<()> + Send + 'static,
    {
        self.deferred_after_save.push_back(Box::new(f));
    }

    /// 是否有任何子缓存存在未提交修改
    pub fn is_dirty(&self) -> bool {
        self.playlist.is_dirty()
            || self.rundowns.is_dirty()
            || self.segments.is_dirty()
            || self.parts.is_dirty()
            || self.part_instances.is_dirty()
            || self.pieces.is_dirty()
            || self.piece_instances.is_dirty()
            || self.timeline.is_dirty()
    }

    /// 计算某个集合的写操作
    pub fn diff_collection(&self, collection: CollectionName) -> Result<Vec<WriteOp>> {
        match collection {
            CollectionName::Playlists => self.playlist.diff(),
            CollectionName::Rundowns => self.rundowns.diff(),
            CollectionName::Segments => self.segments.diff(),
            CollectionName::Parts => self.parts.diff(),
            CollectionName::PartInstances => self.part_instances.diff(),
            CollectionName::Pieces => self.pieces.diff(),
            CollectionName::PieceInstances => self.piece_instances.diff(),
            CollectionName::Timelines => self.timeline.diff(),
        }
    }

    /// 将所有修改写回存储
    ///
    /// 1. 依次执行提交前回调（回调中登记的新回调也会被执行）
    /// 2. 按固定的父子顺序计算并写入每个集合的差异
    /// 3. 以当前值作为新的基线
    /// 4. 依次执行提交后回调
    ///
    /// 写入在集合之间不是原子的：某个集合写入失败时，之前的集合已经落盘，
    /// 错误直接返回，不做补偿
    #[instrument(skip(self, store), level = "info", fields(playlist = %self.playlist_id))]
    pub async fn save_all_to_database(&mut self, store: &dyn DocumentStore) -> Result<SaveSummary> {
        while let Some(callback) = self.deferred.pop_front() {
            callback(self)?;
        }

        let started = Instant::now();
        let mut pending = Vec::new();
        for collection in CollectionName::COMMIT_ORDER {
            let ops = self.diff_collection(collection)?;
            if !ops.is_empty() {
                pending.push((collection, ops));
            }
        }

        let mut summary = SaveSummary::default();
        for (collection, ops) in pending {
            let kinds: Vec<_> = ops.iter().map(WriteOp::kind).collect();
            let written = store.bulk_write(collection, ops).await.map_err(|e| {
                GLOBAL_METRICS.record_commit_failure(self.playlist_id.as_str());
                warn!(
                    "Write to {} failed for playlist {}, storage left partially updated: {}",
                    collection, self.playlist_id, e
                );
                e
            })?;
            for kind in kinds.iter().take(written) {
                GLOBAL_METRICS.record_write(collection.as_str(), kind.as_str());
            }
            summary.collections.push((collection, written));
        }

        self.mark_all_saved();
        let total = summary.total_writes();
        if total > 0 {
            info!(
                "Saved playlist {}: {} writes in {:?}",
                self.playlist_id,
                total,
                started.elapsed()
            );
        }

        let mut first_error = None;
        while let Some(callback) = self.deferred_after_save.pop_front() {
            if let Err(e) = callback(self) {
                warn!("After-save callback failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// 断言没有任何未提交修改或待执行回调
    pub fn assert_no_changes(&self) -> Result<()> {
        self.playlist.assert_no_changes()?;
        self.rundowns.assert_no_changes()?;
        self.segments.assert_no_changes()?;
        self.parts.assert_no_changes()?;
        self.part_instances.assert_no_changes()?;
        self.pieces.assert_no_changes()?;
        self.piece_instances.assert_no_changes()?;
        self.timeline.assert_no_changes()?;

        if !self.deferred.is_empty() {
            return Err(CacheError::UnexpectedChanges(format!(
                "{} deferred callbacks pending",
                self.deferred.len()
            )));
        }
        if !self.deferred_after_save.is_empty() {
            return Err(CacheError::UnexpectedChanges(format!(
                "{} after-save callbacks pending",
                self.deferred_after_save.len()
            )));
        }
        Ok(())
    }

    /// 丢弃所有修改和待执行回调
    pub fn discard_changes(&mut self) {
        self.playlist.discard_changes();
        self.rundowns.discard_changes();
        self.segments.discard_changes();
        self.parts.discard_changes();
        self.part_instances.discard_changes();
        self.pieces.discard_changes();
        self.piece_instances.discard_changes();
        self.timeline.discard_changes();
        self.deferred.clear();
        self.deferred_after_save.clear();
    }

    fn mark_all_saved(&mut self) {
        self.playlist.mark_saved();
        self.rundowns.mark_saved();
        self.segments.mark_saved();
        self.parts.mark_saved();
        self.part_instances.mark_saved();
        self.pieces.mark_saved();
        self.piece_instances.mark_saved();
        self.timeline.mark_saved();
    }
}
