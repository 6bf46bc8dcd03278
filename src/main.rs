//! Command-line interface for firebolt-connector
//!
//! # Usage Examples
//!
//! ## Snapshot
//! ```bash
//! # Print every row of a table as a JSON line
//! firebolt-connector snapshot \
//!   --email me@example.com --password secret \
//!   --account-name acc --engine-name eng \
//!   --database db --table events \
//!   --ordering-columns id --batch-size 50
//!
//! # Keep polling for appended rows, resuming from an explicit position
//! firebolt-connector snapshot ... \
//!   --resume-from "100:3" --idle-polls 10 --poll-interval 5
//! ```
//!
//! ## Load
//! ```bash
//! firebolt-connector load ... --table events --input rows.jsonl
//! cat rows.jsonl | firebolt-connector load ... --table events
//! ```
//!
//! ## Position Format
//! - `batch_id:index_in_batch` (e.g. `100:3` is the fourth row of the page
//!   starting at row 100)

use anyhow::Context;
use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, FilesystemStore, NullStore};
use clap::{Parser, Subcommand};
use connector_core::{Destination, Source};
use firebolt_connector::{run_load, run_snapshot, ConnectionOpts, ReadOpts, SnapshotSettings};
use firebolt_destination::FireboltDestination;
use firebolt_source::FireboltSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "firebolt-connector")]
#[command(about = "Copy table rows out of and into Firebolt")]
#[command(long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a table and print one JSON record per line
    Snapshot {
        #[command(flatten)]
        connection: ConnectionOpts,

        #[command(flatten)]
        read: ReadOpts,

        /// Directory holding the position checkpoint
        #[arg(long, default_value = ".firebolt-checkpoints")]
        checkpoint_dir: PathBuf,

        /// Do not load or store checkpoints
        #[arg(long)]
        no_checkpoints: bool,

        /// Resume after this position instead of the stored checkpoint
        /// Format: batch_id:index_in_batch
        #[arg(long)]
        resume_from: Option<String>,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<u64>,

        /// Stop after this many consecutive polls without new rows
        #[arg(long, default_value = "1")]
        idle_polls: u32,

        /// Seconds to wait between polls without new rows
        #[arg(long, default_value = "1")]
        poll_interval: u64,
    },

    /// Insert JSON objects (one per line) into a table
    Load {
        #[command(flatten)]
        connection: ConnectionOpts,

        /// Input file (default: stdin)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries records, logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Snapshot {
            connection,
            read,
            checkpoint_dir,
            no_checkpoints,
            resume_from,
            limit,
            idle_polls,
            poll_interval,
        } => {
            let resume_from = resume_from
                .as_deref()
                .map(firebolt_source::Position::from_cli_string)
                .transpose()
                .context("Invalid --resume-from position")?;

            let store: Arc<dyn CheckpointStore> = if no_checkpoints {
                Arc::new(NullStore)
            } else {
                Arc::new(FilesystemStore::new(checkpoint_dir))
            };
            let checkpoints = CheckpointManager::new(
                store,
                format!("{}.{}", connection.database, connection.table),
            );

            let settings = SnapshotSettings {
                limit,
                idle_polls: idle_polls.max(1),
                poll_interval: Duration::from_secs(poll_interval),
            };

            run_snapshot_command(&cancel, connection, read, &checkpoints, resume_from, &settings)
                .await
        }
        Commands::Load { connection, input } => {
            run_load_command(&cancel, connection, input).await
        }
    }
}

async fn run_snapshot_command(
    cancel: &CancellationToken,
    connection: ConnectionOpts,
    read: ReadOpts,
    checkpoints: &CheckpointManager,
    resume_from: Option<firebolt_source::Position>,
    settings: &SnapshotSettings,
) -> anyhow::Result<()> {
    tracing::info!(
        "Starting snapshot of {}.{}",
        connection.database,
        connection.table
    );

    let mut config = connection.to_config();
    read.extend_config(&mut config);

    let mut source =
        FireboltSource::with_options(connection.client_options(), connection.engine_start_timeout());
    source.configure(&config).context("Invalid source configuration")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_snapshot(&mut source, cancel, checkpoints, resume_from, settings, &mut out).await?;

    tracing::info!("Snapshot completed successfully");
    Ok(())
}

async fn run_load_command(
    cancel: &CancellationToken,
    connection: ConnectionOpts,
    input: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!("Starting load into {}.{}", connection.database, connection.table);

    let mut destination = FireboltDestination::with_options(
        connection.client_options(),
        connection.engine_start_timeout(),
    );
    destination
        .configure(&connection.to_config())
        .context("Invalid destination configuration")?;

    match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {path:?}"))?;
            run_load(&mut destination, cancel, BufReader::new(file)).await?;
        }
        None => {
            run_load(&mut destination, cancel, BufReader::new(tokio::io::stdin())).await?;
        }
    }

    tracing::info!("Load completed successfully");
    Ok(())
}
