//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单集合的实体缓存。
//!
//! 每个条目同时保存加载时的基线值和当前工作值，提交时通过 [`EntityCache::diff`]
//! 计算出把存储从基线推进到当前值所需的最少写操作。

use super::modifier::Modifier;
use crate::error::{CacheError, Result};
use crate::model::Entity;
use crate::store::{DocumentStore, Filter, WriteOp};
use ahash::AHashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 条目的脏状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// 与基线一致
    Unchanged,
    /// 本事务内新建，没有基线
    Inserted,
    /// 基线存在且被修改过
    Updated,
    /// 待删除，基线保留到提交为止
    Removed,
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    seq: u64,
    current: Option<T>,
    baseline: Option<T>,
    state: DirtyState,
}

impl<T> CacheEntry<T> {
    /// 当前工作值，已删除时为 None
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// 加载时的值，本事务内新建时为 None
    pub fn baseline(&self) -> Option<&T> {
        self.baseline.as_ref()
    }

    pub fn state(&self) -> DirtyState {
        self.state
    }
}

/// 实体缓存
///
/// 按插入顺序保存 id 到条目的映射，并维护按父实体分组、组内按 rank 排序的二级索引
#[derive(Debug, Clone)]
pub struct EntityCache<T: Entity> {
    entries: AHashMap<T::Id, CacheEntry<T>>,
    order: BTreeMap<u64, T::Id>,
    groups: AHashMap<String, Vec<T::Id>>,
    next_seq: u64,
}

impl<T: Entity> Default for EntityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityCache<T> {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            order: BTreeMap::new(),
            groups: AHashMap::new(),
            next_seq: 0,
        }
    }

    /// 用已加载的文档创建缓存，所有条目状态为 `Unchanged`
    pub fn from_documents(docs: impl IntoIterator<Item = T>) -> Self {
        let mut cache = Self::new();
        for doc in docs {
            let id = doc.id().clone();
            if cache.entries.contains_key(&id) {
                continue;
            }
            cache.push_entry(id, Some(doc.clone()), Some(doc), DirtyState::Unchanged);
        }
        cache
    }

    /// 从文档存储加载满足条件的文档
    #[instrument(skip(store, filter), level = "debug", fields(collection = %T::COLLECTION))]
    pub async fn load(store: &dyn DocumentStore, filter: &Filter) -> Result<Self> {
        let raw = store.find(T::COLLECTION, filter).await?;
        let docs = raw
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("loaded {} documents from {}", docs.len(), T::COLLECTION);
        Ok(Self::from_documents(docs))
    }

    /// 从文档存储按ID加载单个文档
    pub async fn load_one(store: &dyn DocumentStore, id: &str) -> Result<Self> {
        let doc = store
            .find_one(T::COLLECTION, id)
            .await?
            .map(serde_json::from_value::<T>)
            .transpose()?;
        Ok(Self::from_documents(doc))
    }

    /// 按ID查找当前值
    pub fn find_one(&self, id: &T::Id) -> Option<&T> {
        self.entries.get(id).and_then(|e| e.current.as_ref())
    }

    /// 按谓词查找当前值，结果按插入顺序排列
    pub fn find<F>(&self, predicate: F) -> Vec<&T>
    where
        F: Fn(&T) -> bool,
    {
        self.iter().filter(|doc| predicate(doc)).collect()
    }

    /// 查找第一个满足谓词的文档
    pub fn find_first<F>(&self, predicate: F) -> Option<&T>
    where
        F: Fn(&T) -> bool,
    {
        self.iter().find(|doc| predicate(doc))
    }

    /// 按插入顺序遍历所有未删除的文档
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order
            .values()
            .filter_map(|id| self.entries.get(id).and_then(|e| e.current.as_ref()))
    }

    /// 查找某分组内的文档，按 `(rank, 插入顺序)` 排序
    pub fn find_in_group(&self, key: &str) -> Vec<&T> {
        let Some(ids) = self.groups.get(key) else {
            return Vec::new();
        };
        let mut docs: Vec<(u64, &T)> = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter_map(|e| e.current.as_ref().map(|doc| (e.seq, doc)))
            .collect();
        docs.sort_by(|(seq_a, a), (seq_b, b)| {
            a.rank().total_cmp(&b.rank()).then(seq_a.cmp(seq_b))
        });
        docs.into_iter().map(|(_, doc)| doc).collect()
    }

    /// 查找某分组内 rank 落在 `[from, to)` 区间的文档
    pub fn find_in_group_range(&self, key: &str, from: f64, to: f64) -> Vec<&T> {
        self.find_in_group(key)
            .into_iter()
            .filter(|doc| doc.rank() >= from && doc.rank() < to)
            .collect()
    }

    /// 获取条目（包括已删除条目）
    pub fn entry(&self, id: &T::Id) -> Option<&CacheEntry<T>> {
        self.entries.get(id)
    }

    /// 未删除的文档数量
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.current.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 插入新文档
    ///
    /// ID已存在且未被删除时返回 `DuplicateId`；若该ID在本事务中被删除且存在基线，
    /// 则恢复为一次更新
    pub fn insert(&mut self, doc: T) -> Result<T::Id> {
        let id = doc.id().clone();
        match self.entries.get(&id).map(|e| e.state) {
            None => {
                self.push_entry(id.clone(), Some(doc), None, DirtyState::Inserted);
            }
            Some(DirtyState::Removed) => {
                self.set_current(&id, doc, DirtyState::Updated);
            }
            Some(_) => return Err(CacheError::duplicate_id(T::COLLECTION, &id)),
        }
        Ok(id)
    }

    /// 插入或整体替换文档
    pub fn upsert(&mut self, doc: T) -> T::Id {
        let id = doc.id().clone();
        match self.entries.get(&id).map(|e| e.state) {
            None => self.push_entry(id.clone(), Some(doc), None, DirtyState::Inserted),
            Some(DirtyState::Inserted) => self.set_current(&id, doc, DirtyState::Inserted),
            Some(_) => self.set_current(&id, doc, DirtyState::Updated),
        }
        id
    }

    /// 按ID应用修改器
    pub fn update(&mut self, id: &T::Id, modifier: &Modifier) -> Result<()> {
        let current = self
            .find_one(id)
            .ok_or_else(|| CacheError::not_found(T::COLLECTION, id))?;
        let next = modifier.apply(current)?;
        self.write_current(id, next);
        Ok(())
    }

    /// 对所有满足谓词的文档应用修改器
    ///
    /// 先计算全部新值再写回，任何一个文档修改失败都不会改变缓存
    pub fn update_where<F>(&mut self, predicate: F, modifier: &Modifier) -> Result<Vec<T::Id>>
    where
        F: Fn(&T) -> bool,
    {
        let updates = self
            .iter()
            .filter(|doc| predicate(doc))
            .map(|doc| Ok((doc.id().clone(), modifier.apply(doc)?)))
            .collect::<Result<Vec<_>>>()?;

        let ids = updates.iter().map(|(id, _)| id.clone()).collect();
        for (id, next) in updates {
            self.write_current(&id, next);
        }
        Ok(ids)
    }

    /// 使用闭包修改单个文档
    ///
    /// 闭包不允许修改文档ID
    pub fn update_with<F>(&mut self, id: &T::Id, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let mut next = self
            .find_one(id)
            .cloned()
            .ok_or_else(|| CacheError::not_found(T::COLLECTION, id))?;
        f(&mut next);
        if next.id() != id {
            return Err(CacheError::InvalidModifier(format!(
                "cannot change id of {} {}",
                T::COLLECTION,
                id
            )));
        }
        self.write_current(id, next);
        Ok(())
    }

    /// 使用闭包修改所有满足谓词的文档
    pub fn update_all_with<P, F>(&mut self, predicate: P, mut f: F) -> Result<Vec<T::Id>>
    where
        P: Fn(&T) -> bool,
        F: FnMut(&mut T),
    {
        let ids: Vec<T::Id> = self
            .iter()
            .filter(|doc| predicate(doc))
            .map(|doc| doc.id().clone())
            .collect();
        for id in &ids {
            self.update_with(id, &mut f)?;
        }
        Ok(ids)
    }

    /// 按ID删除文档
    ///
    /// 本事务内新插入的文档直接丢弃，不会产生任何写操作
    pub fn remove(&mut self, id: &T::Id) -> Result<()> {
        let state = match self.entries.get(id) {
            Some(e) if e.current.is_some() => e.state,
            _ => return Err(CacheError::not_found(T::COLLECTION, id)),
        };

        self.unindex(id);
        if state == DirtyState::Inserted {
            if let Some(entry) = self.entries.remove(id) {
                self.order.remove(&entry.seq);
            }
        } else if let Some(entry) = self.entries.get_mut(id) {
            entry.current = None;
            entry.state = DirtyState::Removed;
        }
        Ok(())
    }

    /// 删除所有满足谓词的文档
    pub fn remove_where<F>(&mut self, predicate: F) -> Vec<T::Id>
    where
        F: Fn(&T) -> bool,
    {
        let ids: Vec<T::Id> = self
            .iter()
            .filter(|doc| predicate(doc))
            .map(|doc| doc.id().clone())
            .collect();
        for id in &ids {
            // 上面刚刚从当前值中取出，删除不会失败
            let _ = self.remove(id);
        }
        ids
    }

    /// 是否存在待提交的修改
    pub fn is_dirty(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.state != DirtyState::Unchanged)
    }

    /// 计算最小写操作集合
    ///
    /// 插入产生完整文档；更新只包含变化的字段，若最终与基线相同则不产生操作；
    /// 删除只针对存在基线的条目
    pub fn diff(&self) -> Result<Vec<WriteOp>> {
        let mut ops = Vec::new();
        for id in self.order.values() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            match (entry.state, &entry.current, &entry.baseline) {
                (DirtyState::Inserted, Some(current), _) => {
                    ops.push(WriteOp::Insert(serde_json::to_value(current)?));
                }
                (DirtyState::Updated, Some(current), Some(baseline)) => {
                    let set = changed_fields(
                        &serde_json::to_value(baseline)?,
                        &serde_json::to_value(current)?,
                    );
                    if !set.is_empty() {
                        ops.push(WriteOp::Update {
                            id: id.to_string(),
                            set,
                        });
                    }
                }
                (DirtyState::Removed, _, Some(_)) => {
                    ops.push(WriteOp::Remove { id: id.to_string() });
                }
                _ => {}
            }
        }
        Ok(ops)
    }

    /// 断言没有任何修改
    ///
    /// 用于验证只读代码路径，失败时报告第一个脏条目
    pub fn assert_no_changes(&self) -> Result<()> {
        for id in self.order.values() {
            if let Some(entry) = self.entries.get(id) {
                if entry.state != DirtyState::Unchanged {
                    return Err(CacheError::UnexpectedChanges(format!(
                        "{} \"{}\" is {:?}",
                        T::COLLECTION,
                        id,
                        entry.state
                    )));
                }
            }
        }
        Ok(())
    }

    /// 提交成功后调用：当前值成为新的基线
    pub fn mark_saved(&mut self) {
        let removed: Vec<(u64, T::Id)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == DirtyState::Removed)
            .map(|(id, e)| (e.seq, id.clone()))
            .collect();
        for (seq, id) in removed {
            self.entries.remove(&id);
            self.order.remove(&seq);
        }
        for entry in self.entries.values_mut() {
            entry.baseline = entry.current.clone();
            entry.state = DirtyState::Unchanged;
        }
    }

    /// 丢弃所有未提交的修改，恢复到基线
    pub fn discard_changes(&mut self) {
        let ids: Vec<T::Id> = self.order.values().cloned().collect();
        for id in ids {
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            match entry.state {
                DirtyState::Unchanged => {}
                DirtyState::Inserted => {
                    self.unindex(&id);
                    if let Some(entry) = self.entries.remove(&id) {
                        self.order.remove(&entry.seq);
                    }
                }
                DirtyState::Updated | DirtyState::Removed => {
                    self.unindex(&id);
                    if let Some(entry) = self.entries.get_mut(&id) {
                        entry.current = entry.baseline.clone();
                        entry.state = DirtyState::Unchanged;
                    }
                    self.index(&id);
                }
            }
        }
    }

    fn push_entry(&mut self, id: T::Id, current: Option<T>, baseline: Option<T>, state: DirtyState) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id.clone());
        self.entries.insert(
            id.clone(),
            CacheEntry {
                seq,
                current,
                baseline,
                state,
            },
        );
        self.index(&id);
    }

    fn set_current(&mut self, id: &T::Id, doc: T, state: DirtyState) {
        self.unindex(id);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.current = Some(doc);
            entry.state = state;
        }
        self.index(id);
    }

    /// 写入更新后的值：本事务内新插入的条目保持 `Inserted`
    fn write_current(&mut self, id: &T::Id, doc: T) {
        let state = match self.entries.get(id).map(|e| e.state) {
            Some(DirtyState::Inserted) => DirtyState::Inserted,
            _ => DirtyState::Updated,
        };
        self.set_current(id, doc, state);
    }

    fn index(&mut self, id: &T::Id) {
        let key = self
            .entries
            .get(id)
            .and_then(|e| e.current.as_ref())
            .and_then(|doc| doc.group_key().map(str::to_string));
        if let Some(key) = key {
            self.groups.entry(key).or_default().push(id.clone());
        }
    }

    fn unindex(&mut self, id: &T::Id) {
        let key = self
            .entries
            .get(id)
            .and_then(|e| e.current.as_ref())
            .and_then(|doc| doc.group_key().map(str::to_string));
        if let Some(key) = key {
            if let Some(ids) = self.groups.get_mut(&key) {
                ids.retain(|existing| existing != id);
                if ids.is_empty() {
                    self.groups.remove(&key);
                }
            }
        }
    }
}

/// 计算从基线到当前值发生变化的顶层字段
///
/// 基线中存在而当前值中缺失的字段以 null 写回
fn changed_fields(baseline: &Value, current: &Value) -> Map<String, Value> {
    let mut set = Map::new();
    let (Some(old), Some(new)) = (baseline.as_object(), current.as_object()) else {
        return set;
    };
    for (key, value) in new {
        if old.get(key) != Some(value) {
            set.insert(key.clone(), value.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            set.insert(key.clone(), Value::Null);
        }
    }
    set
}
