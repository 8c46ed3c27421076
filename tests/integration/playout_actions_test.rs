//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 播出操作集成测试：激活、设置下一个部分、take 与停用

#[path = "../common/mod.rs"]
mod common;

use common::{find_part, fixture, piece, seeded_store, setup_logging, PLAYLIST};
use playout_cache::cache::PlayoutSnapshot;
use playout_cache::model::{CollectionName, PartId, PieceLifespan, PlaylistId};
use playout_cache::store::MemoryStore;
use playout_cache::{CacheError, Config, LockPriority, PlayoutManager};
use serde_json::{json, Value};
use std::sync::Arc;

fn fixture_with_pieces() -> PlayoutSnapshot {
    let mut snapshot = fixture();
    let parts = snapshot.parts.clone();
    for part in &parts {
        snapshot.pieces.push(piece(
            &format!("{}_cam", part.id),
            part,
            "camera",
            PieceLifespan::WithinPart,
        ));
    }
    let p0 = find_part(&snapshot, "p0").clone();
    snapshot
        .pieces
        .push(piece("logo", &p0, "logo", PieceLifespan::OutOnRundownEnd));
    snapshot
}

fn setup(snapshot: &PlayoutSnapshot) -> (Arc<MemoryStore>, PlayoutManager) {
    setup_logging();
    let store = seeded_store(snapshot);
    let manager = PlayoutManager::with_store(store.clone(), Config::default());
    (store, manager)
}

fn playlist_doc(store: &MemoryStore) -> Value {
    store.peek(CollectionName::Playlists, PLAYLIST).unwrap()
}

fn instance_part(store: &MemoryStore, instance_id: &str) -> String {
    store.peek(CollectionName::PartInstances, instance_id).unwrap()["part"]["_id"]
        .as_str()
        .unwrap()
        .to_string()
}

fn pieces_of(store: &MemoryStore, instance_id: &str) -> Vec<Value> {
    store
        .snapshot(CollectionName::PieceInstances)
        .into_iter()
        .filter(|pi| pi["partInstanceId"] == json!(instance_id))
        .collect()
}

#[tokio::test]
async fn test_activate_selects_first_part() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    let next = manager.activate(&key, true).await.unwrap().unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p0");

    let playlist = playlist_doc(&store);
    assert!(playlist["activationId"].is_string());
    assert_eq!(playlist["rehearsal"], json!(true));
    assert_eq!(playlist["nextPartInstanceId"], json!(next.as_str()));
    assert!(playlist["currentPartInstanceId"].is_null());

    // 计划片段被实例化
    let pieces = pieces_of(&store, next.as_str());
    assert_eq!(pieces.len(), 2);

    // 还没有当前部分，时间线为空
    let timeline = store.peek(CollectionName::Timelines, PLAYLIST).unwrap();
    assert_eq!(timeline["objects"], json!([]));

    let again = manager.activate(&key, false).await;
    assert!(matches!(again, Err(CacheError::Playout(_))));
}

#[tokio::test]
async fn test_take_promotes_next_and_picks_following_part() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    let first = manager.activate(&key, false).await.unwrap().unwrap();
    let result = manager.take(&key).await.unwrap();
    assert_eq!(result.current, first);

    let next = result.next.clone().unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p1");

    let playlist = playlist_doc(&store);
    assert_eq!(playlist["currentPartInstanceId"], json!(first.as_str()));
    assert_eq!(playlist["nextPartInstanceId"], json!(next.as_str()));
    assert!(playlist["previousPartInstanceId"].is_null());

    let current = store
        .peek(CollectionName::PartInstances, first.as_str())
        .unwrap();
    assert!(current["plannedStartedAt"].is_string());

    // 时间线包含当前部分的片段
    let timeline = store.peek(CollectionName::Timelines, PLAYLIST).unwrap();
    let mut layers: Vec<&str> = timeline["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["layer"].as_str().unwrap())
        .collect();
    layers.sort();
    assert_eq!(layers, vec!["camera", "logo"]);

    let second = manager.take(&key).await.unwrap();
    assert_eq!(second.current, next);
    assert_eq!(
        playlist_doc(&store)["previousPartInstanceId"],
        json!(first.as_str())
    );
}

#[tokio::test]
async fn test_take_continues_infinite_pieces_into_next() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    manager.activate(&key, false).await.unwrap();
    let result = manager.take(&key).await.unwrap();
    let next = result.next.unwrap();

    let pieces = pieces_of(&store, next.as_str());
    let logo = pieces
        .iter()
        .find(|pi| pi["piece"]["_id"] == json!("logo"))
        .expect("logo continues into the next part");
    assert_eq!(logo["infinite"]["fromPreviousPart"], json!(true));
    assert_eq!(
        logo["infinite"]["infiniteInstanceId"],
        json!(format!("{}_logo", result.current))
    );
    assert_eq!(logo["_id"], json!(format!("{}_logo", next)));
}

#[tokio::test]
async fn test_take_to_end_of_playlist() {
    let (_store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);
    manager.activate(&key, false).await.unwrap();

    let mut last = None;
    for _ in 0..9 {
        last = Some(manager.take(&key).await.unwrap());
    }
    assert_eq!(last.unwrap().next, None);

    let result = manager.take(&key).await;
    assert!(matches!(result, Err(CacheError::Playout(_))));
}

#[tokio::test]
async fn test_looping_playlist_wraps_after_last_take() {
    let mut snapshot = fixture_with_pieces();
    snapshot.playlist.loop_playback = true;
    let (store, manager) = setup(&snapshot);
    let key = PlaylistId::new(PLAYLIST);
    manager.activate(&key, false).await.unwrap();

    let mut last = None;
    for _ in 0..9 {
        last = Some(manager.take(&key).await.unwrap());
    }
    let next = last.unwrap().next.unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p0");
}

#[tokio::test]
async fn test_set_next_part_replaces_untaken_next() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    let original = manager.activate(&key, false).await.unwrap().unwrap();
    let manual = manager
        .set_next(&key, Some(PartId::new("p20")))
        .await
        .unwrap()
        .unwrap();

    assert!(store
        .peek(CollectionName::PartInstances, original.as_str())
        .is_none());
    assert!(pieces_of(&store, original.as_str()).is_empty());

    let result = manager.take(&key).await.unwrap();
    assert_eq!(result.current, manual);
    let next = result.next.unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p21");

    let cleared = manager.set_next(&key, None).await.unwrap();
    assert_eq!(cleared, None);
    assert!(playlist_doc(&store)["nextPartInstanceId"].is_null());
}

#[tokio::test]
async fn test_next_segment_override_is_used_and_cleared() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    manager.activate(&key, false).await.unwrap();
    manager
        .scheduler()
        .run_with_cache_sync(&key, LockPriority::UserPlayout, |cache| {
            cache.update_playlist(|playlist| playlist.next_segment_id = Some("s2".into()))
        })
        .await
        .unwrap();
    manager.set_next(&key, Some(PartId::new("p2"))).await.unwrap();
    let result = manager.take(&key).await.unwrap();

    // 离开 s0 后跳转到指定段落，选中后清除
    let next = result.next.unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p20");
    assert!(playlist_doc(&store)["nextSegmentId"].is_null());
}

#[tokio::test]
async fn test_next_segment_override_applies_on_activation() {
    let mut snapshot = fixture_with_pieces();
    snapshot.playlist.next_segment_id = Some("s1".into());
    let (store, manager) = setup(&snapshot);
    let key = PlaylistId::new(PLAYLIST);

    let next = manager.activate(&key, false).await.unwrap().unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p10");
    assert!(playlist_doc(&store)["nextSegmentId"].is_null());
}

#[tokio::test]
async fn test_set_next_rejects_unplayable_part() {
    let mut snapshot = fixture_with_pieces();
    for part in snapshot.parts.iter_mut() {
        if part.id.as_str() == "p11" {
            part.invalid = true;
        }
    }
    let (store, manager) = setup(&snapshot);
    let key = PlaylistId::new(PLAYLIST);
    manager.activate(&key, false).await.unwrap();
    let writes = store.total_writes();

    let result = manager.set_next(&key, Some(PartId::new("p11"))).await;
    assert!(matches!(result, Err(CacheError::Playout(_))));
    assert_eq!(store.total_writes(), writes);

    let missing = manager.set_next(&key, Some(PartId::new("nope"))).await;
    assert!(matches!(missing, Err(CacheError::NotFound { .. })));
}

#[tokio::test]
async fn test_actions_require_active_playlist() {
    let (_store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);

    assert!(matches!(manager.take(&key).await, Err(CacheError::Playout(_))));
    assert!(matches!(
        manager.set_next(&key, Some(PartId::new("p1"))).await,
        Err(CacheError::Playout(_))
    ));
    assert!(matches!(
        manager.deactivate(&key).await,
        Err(CacheError::Playout(_))
    ));
}

#[tokio::test]
async fn test_deactivate_resets_instances_and_clears_timeline() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);
    manager.activate(&key, false).await.unwrap();
    let taken = manager.take(&key).await.unwrap();

    manager.deactivate(&key).await.unwrap();

    let playlist = playlist_doc(&store);
    assert!(playlist["activationId"].is_null());
    assert!(playlist["currentPartInstanceId"].is_null());
    let instance = store
        .peek(CollectionName::PartInstances, taken.current.as_str())
        .unwrap();
    assert_eq!(instance["reset"], json!(true));
    let timeline = store.peek(CollectionName::Timelines, PLAYLIST).unwrap();
    assert_eq!(timeline["objects"], json!([]));

    // 重新激活后从头开始
    let next = manager.activate(&key, false).await.unwrap().unwrap();
    assert_eq!(instance_part(&store, next.as_str()), "p0");
}

#[tokio::test]
async fn test_lookahead_and_inspect_are_read_only() {
    let (store, manager) = setup(&fixture_with_pieces());
    let key = PlaylistId::new(PLAYLIST);
    manager.activate(&key, false).await.unwrap();
    let writes = store.total_writes();

    let upcoming = manager.lookahead(&key, Some(3)).await.unwrap();
    let upcoming: Vec<&str> = upcoming.iter().map(|id| id.as_str()).collect();
    assert_eq!(upcoming, vec!["p1", "p2", "p10"]);

    let defaulted = manager.lookahead(&key, None).await.unwrap();
    assert_eq!(defaulted.len(), Config::default().lookahead.default_limit);

    let segments = manager.inspect(&key).await.unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].parts[0].id.as_str(), "p10");

    assert_eq!(store.total_writes(), writes);
}
