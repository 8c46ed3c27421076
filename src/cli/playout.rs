//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出相关命令的实现。

use crate::cli::{ActivateArgs, LookaheadArgs, NextArgs, PlaylistArgs};
use crate::manager::PlayoutManager;
use crate::model::{PartId, PlaylistId};
use anyhow::{Context, Result};

pub async fn inspect(manager: &PlayoutManager, args: &PlaylistArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    let segments = manager
        .inspect(&playlist_id)
        .await
        .with_context(|| format!("Playlist '{}' could not be loaded", args.playlist))?;

    println!("=== Playlist {} ===\n", args.playlist);
    if segments.is_empty() {
        println!("No segments.");
        return Ok(());
    }
    for segment in segments {
        println!("{} ({})", segment.name, segment.id);
        for part in segment.parts {
            let marker = if part.playable { " " } else { "x" };
            println!("  [{}] {}  {}", marker, part.id, part.title);
        }
    }
    Ok(())
}

pub async fn lookahead(manager: &PlayoutManager, args: &LookaheadArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    let parts = manager.lookahead(&playlist_id, args.limit).await?;

    if parts.is_empty() {
        println!("Nothing after the playhead.");
    }
    for (index, part) in parts.iter().enumerate() {
        println!("{:>3}. {}", index + 1, part);
    }
    Ok(())
}

pub async fn activate(manager: &PlayoutManager, args: &ActivateArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    let next = manager.activate(&playlist_id, args.rehearsal).await?;

    println!("Playlist {} activated", args.playlist);
    match next {
        Some(next) => println!("  Next: {}", next),
        None => println!("  Next: (none)"),
    }
    Ok(())
}

pub async fn deactivate(manager: &PlayoutManager, args: &PlaylistArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    manager.deactivate(&playlist_id).await?;
    println!("Playlist {} deactivated", args.playlist);
    Ok(())
}

pub async fn next(manager: &PlayoutManager, args: &NextArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    let next = manager
        .set_next(&playlist_id, args.part.as_deref().map(PartId::new))
        .await?;
    match next {
        Some(next) => println!("Next: {}", next),
        None => println!("Next part cleared"),
    }
    Ok(())
}

pub async fn take(manager: &PlayoutManager, args: &PlaylistArgs) -> Result<()> {
    let playlist_id = PlaylistId::new(&args.playlist);
    let result = manager.take(&playlist_id).await?;

    println!("Current: {}", result.current);
    match result.next {
        Some(next) => println!("Next:    {}", next),
        None => println!("Next:    (end of playlist)"),
    }
    Ok(())
}
