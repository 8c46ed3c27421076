//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 文件存储集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{fixture, setup_logging, PLAYLIST};
use playout_cache::cli::seed::demo_snapshot;
use playout_cache::config::{Config, StoreKind};
use playout_cache::model::{CollectionName, PlaylistId};
use playout_cache::store::{ChangeKind, DocumentStore, FileStore, Filter};
use playout_cache::{CacheError, PlayoutManager};
use serde_json::{json, Value};
use std::sync::Arc;

fn read_collection(dir: &std::path::Path, collection: CollectionName) -> Vec<Value> {
    let bytes = std::fs::read(dir.join(format!("{}.json", collection.as_str()))).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_writes_survive_reopen() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();

    {
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .insert_one(
                CollectionName::Parts,
                json!({"_id": "p0", "title": "Intro", "rank": 0.0}),
            )
            .await
            .unwrap();
        store
            .insert_one(
                CollectionName::Parts,
                json!({"_id": "p1", "title": "Sport", "rank": 1.0}),
            )
            .await
            .unwrap();
        let mut set = serde_json::Map::new();
        set.insert("title".to_string(), json!("Headlines"));
        store
            .update_one(CollectionName::Parts, "p0", set)
            .await
            .unwrap();
        store.remove_one(CollectionName::Parts, "p1").await.unwrap();
    }

    let on_disk = read_collection(dir.path(), CollectionName::Parts);
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0]["title"], json!("Headlines"));

    let reopened = FileStore::open(dir.path()).await.unwrap();
    let doc = reopened
        .find_one(CollectionName::Parts, "p0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["title"], json!("Headlines"));
    assert!(reopened
        .find_one(CollectionName::Parts, "p1")
        .await
        .unwrap()
        .is_none());

    let all = reopened
        .find(CollectionName::Parts, &Filter::All)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_duplicate_insert_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let doc = json!({"_id": "s0", "name": "Open"});

    store
        .insert_one(CollectionName::Segments, doc.clone())
        .await
        .unwrap();
    let result = store.insert_one(CollectionName::Segments, doc).await;
    assert!(matches!(result, Err(CacheError::DuplicateId { .. })));
}

#[tokio::test]
async fn test_change_feed_reports_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let mut events = store.subscribe();

    store
        .import(
            CollectionName::Rundowns,
            vec![json!({"_id": "r0", "playlistId": PLAYLIST})],
        )
        .await
        .unwrap();
    store
        .remove_one(CollectionName::Rundowns, "r0")
        .await
        .unwrap();

    // import 不发布通知
    let event = events.try_recv().unwrap();
    assert_eq!(event.collection, CollectionName::Rundowns);
    assert_eq!(event.kind, ChangeKind::Removed);
    assert_eq!(event.id, "r0");
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_manager_runs_playout_on_file_store() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.kind = StoreKind::File;
    config.store.data_dir = dir.path().to_path_buf();

    let key = PlaylistId::new("demo");
    let taken = {
        let manager = PlayoutManager::from_config(config.clone()).await.unwrap();
        let written = manager
            .import_snapshot(&demo_snapshot("demo", 2, 3, false))
            .await
            .unwrap();
        // 播放列表 + 节目单 + 2 个段落 + 6 个部分 + 7 个片段
        assert_eq!(written, 17);

        manager.activate(&key, false).await.unwrap();
        manager.take(&key).await.unwrap()
    };

    let reopened = PlayoutManager::from_config(config).await.unwrap();
    let playlist = reopened
        .store()
        .find_one(CollectionName::Playlists, "demo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        playlist["currentPartInstanceId"],
        json!(taken.current.as_str())
    );

    let upcoming = reopened.lookahead(&key, Some(2)).await.unwrap();
    let upcoming: Vec<&str> = upcoming.iter().map(|id| id.as_str()).collect();
    assert_eq!(upcoming, vec!["demo_part0_2", "demo_part1_0"]);

    let instances = read_collection(dir.path(), CollectionName::PartInstances);
    assert_eq!(instances.len(), 2);
}

#[tokio::test]
async fn test_fixture_import_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let manager = PlayoutManager::with_store(store, Config::default());
    manager.import_snapshot(&fixture()).await.unwrap();

    let reopened = FileStore::open(dir.path()).await.unwrap();
    let parts = reopened
        .find(CollectionName::Parts, &Filter::eq("segmentId", "s1"))
        .await
        .unwrap();
    assert_eq!(parts.len(), 3);
}
