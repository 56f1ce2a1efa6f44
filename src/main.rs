use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use yamuse_dl::models::{Quality, Status, TrackRequest};
use yamuse_dl::store::ClearScope;
use yamuse_dl::Core;

#[derive(Parser)]
#[command(name = "yamuse", about = "Persistent download queue for a signed remote music service")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(long, global = true, default_value = "yamuse.db")]
    database: String,

    /// Root directory finished tracks are written under. Falls back to the
    /// catalog's persisted `download_path` setting (then ".") when omitted.
    #[arg(long, global = true)]
    download_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue a single track
    Enqueue {
        track_id: String,
        title: String,
        artist: String,
        album: String,
        /// Namespace used for deduplication and the top-level folder
        #[arg(long, default_value = "default")]
        playlist: String,
        #[arg(long, value_enum, default_value = "lossless")]
        quality: QualityArg,
    },
    /// Resolve a playlist and enqueue only the tracks not yet downloaded or queued
    Preview {
        playlist_id: String,
        #[arg(long, value_enum, default_value = "lossless")]
        quality: QualityArg,
    },
    /// Start the worker (promotes pending items, resumes after a crash)
    Start,
    /// Pause the worker after the current item finishes
    Pause,
    /// Resume a paused worker
    Resume,
    /// Stop the worker, cancelling any in-flight item
    Stop,
    /// Stop then start the worker
    Restart,
    /// Print queue items and aggregate stats
    Status,
    /// Remove queue rows
    Clear {
        #[arg(long, value_enum, default_value = "completed")]
        scope: ClearScopeArg,
    },
    /// Remove specific queue rows by id
    Remove {
        ids: Vec<i64>,
    },
    /// Bulk-transition queue rows from one status to another (e.g. retry
    /// every `error` row by moving it back to `queued`)
    ChangeStatus {
        #[arg(long, value_enum)]
        from: StatusArg,
        #[arg(long, value_enum)]
        to: StatusArg,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Verify every finished track's file still exists, pruning missing rows
    Sweep,
}

#[derive(Clone, clap::ValueEnum)]
enum StatusArg {
    Pending,
    Queued,
    Downloading,
    Completed,
    Error,
}

impl From<StatusArg> for Status {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Status::Pending,
            StatusArg::Queued => Status::Queued,
            StatusArg::Downloading => Status::Downloading,
            StatusArg::Completed => Status::Completed,
            StatusArg::Error => Status::Error,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum QualityArg {
    Lossless,
    Hq,
    Nq,
}

impl From<QualityArg> for Quality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Lossless => Quality::Lossless,
            QualityArg::Hq => Quality::Hq,
            QualityArg::Nq => Quality::Nq,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum ClearScopeArg {
    Completed,
    Pending,
    All,
}

impl From<ClearScopeArg> for ClearScope {
    fn from(value: ClearScopeArg) -> Self {
        match value {
            ClearScopeArg::Completed => ClearScope::Completed,
            ClearScopeArg::Pending => ClearScope::Pending,
            ClearScopeArg::All => ClearScope::All,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let core = Core::init(&cli.database, cli.download_root)
        .await
        .context("failed to initialize core")?;
    let controller = &core.controller;

    match cli.command {
        Command::Enqueue { track_id, title, artist, album, playlist, quality } => {
            let outcome = controller
                .add_one(
                    TrackRequest { track_id, title, artist, album, playlist, cover_url: None },
                    quality.into(),
                )
                .await?;
            println!("added {}, duplicates {}, skipped {}", outcome.added, outcome.duplicates, outcome.skipped);
        }
        Command::Preview { playlist_id, quality } => {
            let outcome = controller.preview(&playlist_id, quality.into()).await?;
            println!(
                "added {}, already queued {}, already downloaded {}",
                outcome.added, outcome.duplicates, outcome.skipped
            );
        }
        Command::Start => {
            controller.start().await?;
            println!("worker started");
        }
        Command::Pause => {
            controller.pause().await?;
            println!("worker paused");
        }
        Command::Resume => {
            controller.resume().await?;
            println!("worker resumed");
        }
        Command::Stop => {
            controller.stop().await;
            println!("worker stopped");
        }
        Command::Restart => {
            controller.restart().await?;
            println!("worker restarted");
        }
        Command::Status => {
            let stats = controller.get_stats().await?;
            println!(
                "pending {} queued {} downloading {} completed {} error {} (running={} paused={})",
                stats.pending,
                stats.queued,
                stats.downloading,
                stats.completed,
                stats.error,
                stats.running,
                stats.paused,
            );
            if let Some(track_id) = &stats.current_track_id {
                println!("current: {track_id}");
            }
            println!("catalog: {} files, {:.1} MiB", stats.total_files, stats.total_size_mib);

            for item in controller.get_queue(None).await? {
                println!(
                    "  [{:>3}] {} — {} — {} ({}, {}%)",
                    item.id,
                    item.artist,
                    item.title,
                    status_label(item.status),
                    item.quality,
                    item.progress,
                );
            }
        }
        Command::Clear { scope } => {
            let removed = controller.clear(scope.into()).await?;
            println!("removed {removed} item(s)");
        }
        Command::Remove { ids } => {
            let removed = controller.remove_selected(&ids).await?;
            println!("removed {removed} item(s)");
        }
        Command::ChangeStatus { from, to, limit } => {
            let changed = controller.change_status(from.into(), to.into(), limit).await?;
            println!("transitioned {changed} item(s)");
        }
        Command::Sweep => {
            let (checked, existing, missing, deleted) = controller.sweep().await?;
            println!("checked {checked}, existing {existing}, missing {missing}, deleted {deleted}");
        }
    }

    Ok(())
}

fn status_label(status: Status) -> &'static str {
    status.as_str()
}
