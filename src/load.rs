//! Load command: write JSON lines through a [`Destination`].

use anyhow::Context;
use connector_core::{CancellationToken, Data, Destination, Metadata, Record};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Write every non-blank line of `input` as one record.
///
/// Stops at the first failing line. Returns the number of records written.
pub async fn run_load<D, R>(
    destination: &mut D,
    cancel: &CancellationToken,
    input: R,
) -> anyhow::Result<u64>
where
    D: Destination,
    R: AsyncBufRead + Unpin,
{
    destination
        .open(cancel)
        .await
        .context("Failed to open destination")?;

    let result = write_lines(destination, cancel, input).await;
    let teardown = destination.teardown(cancel).await;

    let count = result?;
    teardown.context("Failed to tear down destination")?;
    tracing::info!("Loaded {count} records");
    Ok(count)
}

async fn write_lines<D, R>(destination: &mut D, cancel: &CancellationToken, input: R) -> anyhow::Result<u64>
where
    D: Destination,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_number = 0u64;
    let mut count = 0u64;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("Load cancelled"),
            line = lines.next_line() => line.context("Failed to read input")?,
        };
        let Some(line) = line else { break };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        let record = Record::create(Metadata::new(), Data::Raw(line.into_bytes()));
        destination
            .write(cancel, &record)
            .await
            .with_context(|| format!("Failed to write line {line_number}"))?;
        count += 1;
    }

    Ok(count)
}
