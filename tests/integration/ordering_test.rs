//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 播出顺序、预读和无限片段延续集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{find_part, fixture, instance_of, piece, setup_logging, PART_IDS};
use playout_cache::cache::PlayoutCache;
use playout_cache::model::{PieceInstance, PieceLifespan};
use playout_cache::playout::{
    can_continue_infinite_across, continuing_infinites, ordered_segments_and_parts,
    parts_after_playhead,
};

fn ids(parts: &[&playout_cache::model::Part]) -> Vec<String> {
    parts.iter().map(|p| p.id.to_string()).collect()
}

#[test]
fn test_ordered_segments_and_parts_follow_rank() {
    setup_logging();
    let cache = PlayoutCache::from_snapshot(fixture());
    let ordered = ordered_segments_and_parts(&cache);

    let order: Vec<&str> = ordered.part_ids().into_iter().map(|id| id.as_str()).collect();
    assert_eq!(order, PART_IDS.to_vec());

    let segments: Vec<&str> = ordered
        .segments
        .iter()
        .map(|s| s.segment.id.as_str())
        .collect();
    assert_eq!(segments, vec!["s0", "s1", "s2"]);
    assert!(ordered.parts().all(|p| p.playable));
}

#[test]
fn test_unplayable_parts_stay_in_structure() {
    let mut snapshot = fixture();
    for part in snapshot.parts.iter_mut() {
        if part.id.as_str() == "p11" {
            part.invalid = true;
        }
        if part.id.as_str() == "p21" {
            part.floated = true;
        }
    }
    let cache = PlayoutCache::from_snapshot(snapshot);
    let ordered = ordered_segments_and_parts(&cache);

    assert_eq!(ordered.part_count(), 9);
    let unplayable: Vec<&str> = ordered
        .parts()
        .filter(|p| !p.playable)
        .map(|p| p.part.id.as_str())
        .collect();
    assert_eq!(unplayable, vec!["p11", "p21"]);
}

#[test]
fn test_hidden_segment_parts_are_unplayable() {
    let mut snapshot = fixture();
    for segment in snapshot.segments.iter_mut() {
        if segment.id.as_str() == "s1" {
            segment.hidden = true;
        }
    }
    let cache = PlayoutCache::from_snapshot(snapshot);
    let ordered = ordered_segments_and_parts(&cache);

    let playable: Vec<&str> = ordered
        .parts()
        .filter(|p| p.playable)
        .map(|p| p.part.id.as_str())
        .collect();
    assert_eq!(playable, vec!["p0", "p1", "p2", "p20", "p21", "p22"]);
}

#[test]
fn test_can_continue_infinite_across() {
    let snapshot = fixture();
    let p = |id: &str| instance_of(find_part(&snapshot, id), "act0", false);
    let cache = PlayoutCache::from_snapshot(snapshot.clone());
    let ordered = ordered_segments_and_parts(&cache);
    let playlist = cache.playlist().unwrap();

    let (p0, p1, p2, p10, p22) = (p("p0"), p("p1"), p("p2"), p("p10"), p("p22"));

    assert!(can_continue_infinite_across(playlist, &ordered, Some(&p0), &p1));
    assert!(!can_continue_infinite_across(playlist, &ordered, Some(&p1), &p0));
    assert!(!can_continue_infinite_across(playlist, &ordered, None, &p1));
    assert!(!can_continue_infinite_across(playlist, &ordered, Some(&p1), &p1));

    // 跨段落以及从第一个部分到最后一个部分
    assert!(can_continue_infinite_across(playlist, &ordered, Some(&p2), &p10));
    assert!(can_continue_infinite_across(playlist, &ordered, Some(&p0), &p22));
}

#[test]
fn test_orphaned_adlib_occupies_fractional_rank() {
    let snapshot = fixture();
    let p0 = instance_of(find_part(&snapshot, "p0"), "act0", false);
    let p1 = instance_of(find_part(&snapshot, "p1"), "act0", false);

    let mut adlib_part = common::part("adlib0", "s0", 0.5);
    adlib_part.title = "Breaking".to_string();
    let adlib = instance_of(&adlib_part, "act0", true);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let ordered = ordered_segments_and_parts(&cache);
    let playlist = cache.playlist().unwrap();

    assert!(can_continue_infinite_across(playlist, &ordered, Some(&p0), &adlib));
    assert!(!can_continue_infinite_across(playlist, &ordered, Some(&p1), &adlib));
    assert!(can_continue_infinite_across(playlist, &ordered, Some(&adlib), &p1));
}

#[test]
fn test_different_activation_does_not_continue() {
    let mut snapshot = fixture();
    snapshot.playlist.activation_id = Some("act1".to_string());
    let p0 = instance_of(find_part(&snapshot, "p0"), "act0", false);
    let p1 = instance_of(find_part(&snapshot, "p1"), "act1", false);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let ordered = ordered_segments_and_parts(&cache);
    let playlist = cache.playlist().unwrap();

    assert!(!can_continue_infinite_across(playlist, &ordered, Some(&p0), &p1));
}

#[test]
fn test_lookahead_with_loop_wraps_and_skips_invalid() {
    setup_logging();
    let mut snapshot = fixture();
    snapshot.playlist.loop_playback = true;
    for part in snapshot.parts.iter_mut() {
        if part.id.as_str() == "p1" {
            part.invalid = true;
        }
    }
    let last = instance_of(find_part(&snapshot, "p22"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(last.id.clone());
    snapshot.part_instances.push(last);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 5).unwrap();
    assert_eq!(ids(&parts), vec!["p0", "p2", "p10", "p11", "p12"]);
}

#[test]
fn test_lookahead_without_loop_stops_at_end() {
    let mut snapshot = fixture();
    let at = instance_of(find_part(&snapshot, "p21"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(at.id.clone());
    snapshot.part_instances.push(at);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 5).unwrap();
    assert_eq!(ids(&parts), vec!["p22"]);
}

#[test]
fn test_lookahead_prefers_next_over_current() {
    let mut snapshot = fixture();
    let current = instance_of(find_part(&snapshot, "p0"), "act0", false);
    let next = instance_of(find_part(&snapshot, "p1"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(current.id.clone());
    snapshot.playlist.next_part_instance_id = Some(next.id.clone());
    snapshot.part_instances.push(current);
    snapshot.part_instances.push(next);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 2).unwrap();
    assert_eq!(ids(&parts), vec!["p2", "p10"]);
}

#[test]
fn test_lookahead_without_playhead_starts_at_first_part() {
    let cache = PlayoutCache::from_snapshot(fixture());
    let parts = parts_after_playhead(&cache, 3).unwrap();
    assert_eq!(ids(&parts), vec!["p0", "p1", "p2"]);

    assert!(parts_after_playhead(&cache, 0).unwrap().is_empty());
    assert_eq!(parts_after_playhead(&cache, 100).unwrap().len(), 9);
}

#[test]
fn test_lookahead_honors_next_segment_override() {
    let mut snapshot = fixture();
    let current = instance_of(find_part(&snapshot, "p0"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(current.id.clone());
    snapshot.playlist.next_segment_id = Some("s2".into());
    snapshot.part_instances.push(current);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 4).unwrap();
    assert_eq!(ids(&parts), vec!["p1", "p2", "p20", "p21"]);
}

#[test]
fn test_lookahead_override_applies_after_last_part() {
    let mut snapshot = fixture();
    let last = instance_of(find_part(&snapshot, "p22"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(last.id.clone());
    snapshot.playlist.next_segment_id = Some("s1".into());
    snapshot.part_instances.push(last);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 3).unwrap();
    assert_eq!(ids(&parts), vec!["p10", "p11", "p12"]);
}

#[test]
fn test_lookahead_backward_override_never_repeats_parts() {
    let mut snapshot = fixture();
    snapshot.playlist.loop_playback = true;
    let current = instance_of(find_part(&snapshot, "p0"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(current.id.clone());
    snapshot.playlist.next_segment_id = Some("s0".into());
    snapshot.part_instances.push(current);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 100).unwrap();
    // 跳回 s0 后再次到达 p1 即形成循环
    assert_eq!(ids(&parts), vec!["p1", "p2", "p0"]);

    let mut unique = ids(&parts);
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), parts.len());
}

#[test]
fn test_lookahead_loop_returns_each_part_once() {
    let mut snapshot = fixture();
    snapshot.playlist.loop_playback = true;
    let current = instance_of(find_part(&snapshot, "p11"), "act0", false);
    snapshot.playlist.current_part_instance_id = Some(current.id.clone());
    snapshot.part_instances.push(current);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 100).unwrap();
    assert_eq!(
        ids(&parts),
        vec!["p12", "p20", "p21", "p22", "p0", "p1", "p2", "p10", "p11"]
    );
}

#[test]
fn test_lookahead_orphan_outside_view_ends_walk() {
    let mut snapshot = fixture();
    let stray = instance_of(&common::part("adlib9", "s9", 0.5), "act0", true);
    snapshot.playlist.current_part_instance_id = Some(stray.id.clone());
    snapshot.part_instances.push(stray);

    let cache = PlayoutCache::from_snapshot(snapshot);
    assert!(parts_after_playhead(&cache, 3).unwrap().is_empty());
}

#[test]
fn test_lookahead_after_orphaned_adlib() {
    let mut snapshot = fixture();
    let adlib = instance_of(&common::part("adlib0", "s0", 0.5), "act0", true);
    snapshot.playlist.current_part_instance_id = Some(adlib.id.clone());
    snapshot.part_instances.push(adlib);

    let cache = PlayoutCache::from_snapshot(snapshot);
    let parts = parts_after_playhead(&cache, 2).unwrap();
    assert_eq!(ids(&parts), vec!["p1", "p2"]);
}

#[test]
fn test_continuing_infinites_respect_lifespan_and_layers() {
    setup_logging();
    let mut snapshot = fixture();
    let p0 = find_part(&snapshot, "p0").clone();
    let p1 = find_part(&snapshot, "p1").clone();
    let p10 = find_part(&snapshot, "p10").clone();

    let previous = instance_of(&p0, "act0", false);
    let segment_gfx = piece("gfx", &p0, "graphics", PieceLifespan::OutOnSegmentEnd);
    let show_bug = piece("bug", &p0, "bug", PieceLifespan::OutOnRundownEnd);
    let camera = piece("cam0", &p0, "camera", PieceLifespan::WithinPart);
    let mut muted = PieceInstance::from_piece(
        &piece("music", &p0, "audio", PieceLifespan::OutOnShowStyleEnd),
        &previous,
    );
    muted.disabled = true;

    for planned in [&segment_gfx, &show_bug, &camera] {
        snapshot
            .piece_instances
            .push(PieceInstance::from_piece(planned, &previous));
    }
    snapshot.piece_instances.push(muted);
    snapshot.part_instances.push(previous.clone());

    let same_segment = instance_of(&p1, "act0", false);
    let next_segment = instance_of(&p10, "act0", false);

    let cache = PlayoutCache::from_snapshot(snapshot.clone());
    let ordered = ordered_segments_and_parts(&cache);

    let mut continued: Vec<String> =
        continuing_infinites(&cache, &ordered, Some(&previous), &same_segment)
            .unwrap()
            .iter()
            .map(|pi| pi.piece.id.to_string())
            .collect();
    continued.sort();
    assert_eq!(continued, vec!["bug", "gfx"]);

    let across = continuing_infinites(&cache, &ordered, Some(&previous), &next_segment).unwrap();
    assert_eq!(across.len(), 1);
    let bug = &across[0];
    assert_eq!(bug.piece.id.as_str(), "bug");
    assert_eq!(bug.part_instance_id, next_segment.id);
    assert_eq!(bug.id.as_str(), format!("{}_bug", next_segment.id));
    let infinite = bug.infinite.as_ref().unwrap();
    assert!(infinite.from_previous_part);
    assert_eq!(
        infinite.infinite_instance_id,
        format!("{}_bug", previous.id)
    );

    // 候选部分在同一源层上有计划片段时不延续
    snapshot
        .pieces
        .push(piece("gfx1", &p1, "graphics", PieceLifespan::WithinPart));
    let cache = PlayoutCache::from_snapshot(snapshot);
    let ordered = ordered_segments_and_parts(&cache);
    let continued: Vec<String> =
        continuing_infinites(&cache, &ordered, Some(&previous), &same_segment)
            .unwrap()
            .iter()
            .map(|pi| pi.piece.id.to_string())
            .collect();
    assert_eq!(continued, vec!["bug"]);

    // 倒退时不延续
    let backwards = instance_of(&p0, "act0", false);
    assert!(
        continuing_infinites(&cache, &ordered, Some(&same_segment), &backwards)
            .unwrap()
            .is_empty()
    );
}
