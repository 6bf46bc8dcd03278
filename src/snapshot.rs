//! Snapshot command: read a table through a [`Source`] and print records.

use anyhow::Context;
use checkpoint::{Checkpoint, CheckpointManager};
use connector_core::{CancellationToken, Data, Metadata, Operation, Record, Source};
use firebolt_source::Position;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// When to stop reading.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    /// Stop after this many records
    pub limit: Option<u64>,
    /// Stop after this many consecutive reads found no data
    pub idle_polls: u32,
    /// Pause between reads that found no data
    pub poll_interval: Duration,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            limit: None,
            idle_polls: 1,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// One output line.
#[derive(Serialize)]
struct RecordLine<'a> {
    position: String,
    operation: Operation,
    metadata: &'a Metadata,
    key: serde_json::Value,
    payload: serde_json::Value,
}

fn data_json(data: &Data) -> serde_json::Value {
    match data {
        Data::Structured(row) => serde_json::to_value(row).unwrap_or_default(),
        Data::Raw(bytes) => serde_json::from_slice(bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into())),
    }
}

fn write_record<W: Write>(out: &mut W, record: &Record, position: &Position) -> anyhow::Result<()> {
    let line = RecordLine {
        position: position.to_cli_string(),
        operation: record.operation,
        metadata: &record.metadata,
        key: data_json(&record.key),
        payload: data_json(&record.payload),
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

/// Read records until the table is drained (or the limit is hit), printing
/// and acknowledging each one and checkpointing its position.
///
/// The start position is `resume_from` if given, else the stored checkpoint.
/// Returns the number of records written.
pub async fn run_snapshot<S, W>(
    source: &mut S,
    cancel: &CancellationToken,
    checkpoints: &CheckpointManager,
    resume_from: Option<Position>,
    settings: &SnapshotSettings,
    out: &mut W,
) -> anyhow::Result<u64>
where
    S: Source,
    W: Write,
{
    let start = match resume_from {
        Some(position) => Some(position),
        None => checkpoints
            .load::<Position>()
            .await
            .context("Failed to load checkpoint")?,
    };
    match &start {
        Some(position) => tracing::info!("Resuming after position {}", position.to_cli_string()),
        None => tracing::info!("Starting from the beginning of the table"),
    }
    let start = start.map(|p| p.to_record_position()).transpose()?;

    source
        .open(cancel, start.as_ref())
        .await
        .context("Failed to open source")?;

    let result = read_loop(source, cancel, checkpoints, settings, out).await;
    let teardown = source.teardown(cancel).await;

    let count = result?;
    teardown.context("Failed to tear down source")?;
    tracing::info!("Snapshot wrote {count} records");
    Ok(count)
}

async fn read_loop<S, W>(
    source: &mut S,
    cancel: &CancellationToken,
    checkpoints: &CheckpointManager,
    settings: &SnapshotSettings,
    out: &mut W,
) -> anyhow::Result<u64>
where
    S: Source,
    W: Write,
{
    let mut count = 0u64;
    let mut idle = 0u32;

    while settings.limit.map_or(true, |limit| count < limit) {
        let Some(record) = source.read(cancel).await.context("Failed to read record")? else {
            idle += 1;
            if idle >= settings.idle_polls {
                tracing::debug!("No new rows after {idle} polls");
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => anyhow::bail!("Snapshot cancelled"),
                _ = tokio::time::sleep(settings.poll_interval) => {}
            }
            continue;
        };
        idle = 0;

        let position = Position::parse(Some(&record.position))?;
        write_record(out, &record, &position)?;
        out.flush()?;

        source
            .ack(cancel, &record.position)
            .await
            .context("Failed to acknowledge record")?;
        checkpoints.save(&position).await?;
        count += 1;
    }

    Ok(count)
}
