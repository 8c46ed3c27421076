//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了演示数据的生成和写入。

use crate::cache::PlayoutSnapshot;
use crate::cli::SeedArgs;
use crate::manager::PlayoutManager;
use crate::model::{Part, Piece, PieceLifespan, Playlist, Rundown, Segment};
use anyhow::{Context, Result};

/// 构造一个演示播放列表
///
/// 一个节目单，`segments` 个段落，每个段落 `parts` 个部分。每个部分带一个摄像机片段，
/// 第一个部分额外带一个延续到节目单结束的台标片段
pub fn demo_snapshot(
    playlist_id: &str,
    segments: usize,
    parts: usize,
    loop_playback: bool,
) -> PlayoutSnapshot {
    let mut playlist = Playlist::new(playlist_id, format!("Demo {}", playlist_id));
    playlist.loop_playback = loop_playback;

    let mut snapshot = PlayoutSnapshot::new(playlist);
    let rundown_id = format!("{}_rundown0", playlist_id);
    snapshot.rundowns.push(Rundown {
        id: rundown_id.as_str().into(),
        playlist_id: playlist_id.into(),
        name: "Main".to_string(),
        rank: 0.0,
    });

    for s in 0..segments {
        let segment_id = format!("{}_segment{}", playlist_id, s);
        snapshot.segments.push(Segment {
            id: segment_id.as_str().into(),
            rundown_id: rundown_id.as_str().into(),
            name: format!("Segment {}", s),
            rank: s as f64,
            hidden: false,
        });

        for p in 0..parts {
            let part_id = format!("{}_part{}_{}", playlist_id, s, p);
            snapshot.parts.push(Part {
                id: part_id.as_str().into(),
                rundown_id: rundown_id.as_str().into(),
                segment_id: segment_id.as_str().into(),
                title: format!("Story {}.{}", s, p),
                rank: p as f64,
                invalid: false,
                floated: false,
                expected_duration_ms: Some(30_000),
            });
            snapshot.pieces.push(demo_piece(
                &rundown_id,
                &segment_id,
                &part_id,
                "camera",
                PieceLifespan::WithinPart,
            ));
            if s == 0 && p == 0 {
                snapshot.pieces.push(demo_piece(
                    &rundown_id,
                    &segment_id,
                    &part_id,
                    "logo",
                    PieceLifespan::OutOnRundownEnd,
                ));
            }
        }
    }
    snapshot
}

fn demo_piece(
    rundown_id: &str,
    segment_id: &str,
    part_id: &str,
    layer: &str,
    lifespan: PieceLifespan,
) -> Piece {
    Piece {
        id: format!("{}_{}", part_id, layer).into(),
        start_rundown_id: rundown_id.into(),
        start_segment_id: segment_id.into(),
        start_part_id: part_id.into(),
        name: layer.to_string(),
        source_layer_id: layer.to_string(),
        lifespan,
        start_ms: 0,
        invalid: false,
    }
}

pub async fn execute(manager: &PlayoutManager, args: &SeedArgs) -> Result<()> {
    let snapshot = demo_snapshot(&args.playlist, args.segments, args.parts, args.loop_playback);
    let written = manager
        .import_snapshot(&snapshot)
        .await
        .with_context(|| format!("Failed to seed playlist '{}'", args.playlist))?;

    println!(
        "Seeded playlist {} with {} segments x {} parts ({} documents)",
        args.playlist, args.segments, args.parts, written
    );
    Ok(())
}
