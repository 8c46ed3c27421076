//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::{Config, StoreKind};
use crate::manager::PlayoutManager;
use crate::metrics::get_metrics_string;
use crate::telemetry::init_tracing;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "playout-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Data directory of the file store")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Print metrics after the command finishes")]
    pub show_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "seed", about = "Write a demo playlist into the store")]
    Seed(SeedArgs),

    #[command(name = "inspect", about = "Print the ordered segments and parts")]
    Inspect(PlaylistArgs),

    #[command(name = "lookahead", about = "Print the parts after the playhead")]
    Lookahead(LookaheadArgs),

    #[command(name = "activate", about = "Activate a playlist")]
    Activate(ActivateArgs),

    #[command(name = "deactivate", about = "Deactivate a playlist")]
    Deactivate(PlaylistArgs),

    #[command(name = "next", about = "Set the next part")]
    Next(NextArgs),

    #[command(name = "take", about = "Take the next part")]
    Take(PlaylistArgs),
}

#[derive(Parser, Debug)]
pub struct PlaylistArgs {
    #[arg(help = "Playlist id")]
    pub playlist: String,
}

#[derive(Parser, Debug)]
pub struct SeedArgs {
    #[arg(help = "Playlist id")]
    pub playlist: String,

    #[arg(short, long, default_value_t = 3, help = "Number of segments")]
    pub segments: usize,

    #[arg(short, long, default_value_t = 3, help = "Number of parts per segment")]
    pub parts: usize,

    #[arg(long = "loop", help = "Loop back to the first part at the end")]
    pub loop_playback: bool,
}

#[derive(Parser, Debug)]
pub struct LookaheadArgs {
    #[arg(help = "Playlist id")]
    pub playlist: String,

    #[arg(short, long, help = "Maximum number of parts")]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct ActivateArgs {
    #[arg(help = "Playlist id")]
    pub playlist: String,

    #[arg(short, long, help = "Activate in rehearsal mode")]
    pub rehearsal: bool,
}

#[derive(Parser, Debug)]
pub struct NextArgs {
    #[arg(help = "Playlist id")]
    pub playlist: String,

    #[arg(help = "Part id, omit to clear the next part")]
    pub part: Option<String>,
}

mod playout;
pub mod seed;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_tracing(&config.global.service_name, &config.global.log_filter);
    let enable_metrics = config.global.enable_metrics;

    let manager = PlayoutManager::from_config(config)
        .await
        .context("Failed to initialize playout manager")?;

    match &cli.command {
        Commands::Seed(args) => seed::execute(&manager, args).await?,
        Commands::Inspect(args) => playout::inspect(&manager, args).await?,
        Commands::Lookahead(args) => playout::lookahead(&manager, args).await?,
        Commands::Activate(args) => playout::activate(&manager, args).await?,
        Commands::Deactivate(args) => playout::deactivate(&manager, args).await?,
        Commands::Next(args) => playout::next(&manager, args).await?,
        Commands::Take(args) => playout::take(&manager, args).await?,
    }

    if cli.show_metrics && enable_metrics {
        println!("\n=== Metrics ===\n{}", get_metrics_string());
    }
    Ok(())
}

/// 命令行默认使用文件存储，`--data-dir` 覆盖配置文件中的目录
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let mut config = Config::default();
            config.store.kind = StoreKind::File;
            config
        }
    };
    if let Some(dir) = &cli.data_dir {
        config.store.kind = StoreKind::File;
        config.store.data_dir = dir.clone();
    }
    Ok(config)
}
