//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于JSON文件的文档存储实现。
//!
//! 每个集合对应数据目录下的一个 `<collection>.json` 文件，内容为文档数组。
//! 每次写入后整集合重写，先写入临时文件再原子重命名。

use super::{ChangeEvent, DocumentStore, Filter, MemoryStore, WriteOp};
use crate::error::{CacheError, Result};
use crate::model::CollectionName;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument};

/// JSON文件文档存储
pub struct FileStore {
    dir: PathBuf,
    inner: MemoryStore,
    /// 串行化文件写入
    write_lock: Mutex<()>,
}

impl FileStore {
    /// 打开数据目录，加载所有已存在的集合文件
    ///
    /// # 参数
    ///
    /// * `dir` - 数据目录，不存在时自动创建
    #[instrument(skip(dir), level = "info", fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let inner = MemoryStore::new();
        let mut loaded = 0;
        for collection in CollectionName::COMMIT_ORDER {
            let path = collection_path(&dir, collection);
            if !tokio::fs::try_exists(&path).await? {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let docs: Vec<Value> = serde_json::from_slice(&bytes)?;
            loaded += docs.len();
            inner.seed(collection, docs)?;
        }
        info!("FileStore opened with {} documents", loaded);

        Ok(Self {
            dir,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }

    /// 将一批文档写入集合并落盘
    ///
    /// 用于初始化数据，已存在的同ID文档会被覆盖
    pub async fn import(&self, collection: CollectionName, docs: Vec<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.seed(collection, docs)?;
        self.persist(collection).await
    }

    async fn persist(&self, collection: CollectionName) -> Result<()> {
        let docs = self.inner.snapshot(collection);
        let dir = self.dir.clone();
        let path = collection_path(&dir, collection);
        let count = docs.len();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let bytes = serde_json::to_vec_pretty(&docs)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)
                .map_err(|e| CacheError::IoError(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Store(format!("persist task failed: {}", e)))??;

        debug!("persisted {} documents to {}", count, collection);
        Ok(())
    }
}

fn collection_path(dir: &Path, collection: CollectionName) -> PathBuf {
    dir.join(format!("{}.json", collection.as_str()))
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn find_one(&self, collection: CollectionName, id: &str) -> Result<Option<Value>> {
        self.inner.find_one(collection, id).await
    }

    async fn find(&self, collection: CollectionName, filter: &Filter) -> Result<Vec<Value>> {
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: CollectionName, doc: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.insert_one(collection, doc).await?;
        self.persist(collection).await
    }

    async fn update_one(
        &self,
        collection: CollectionName,
        id: &str,
        set: Map<String, Value>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.update_one(collection, id, set).await?;
        self.persist(collection).await
    }

    async fn remove_one(&self, collection: CollectionName, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.remove_one(collection, id).await?;
        self.persist(collection).await
    }

    /// 整批写入内存后只落盘一次
    async fn bulk_write(&self, collection: CollectionName, ops: Vec<WriteOp>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let result = self.inner.bulk_write(collection, ops).await;
        // 部分成功的写入同样需要落盘
        self.persist(collection).await?;
        result
    }
}
