//! Record key column resolution.

use firebolt_repository::TableReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;

/// Where the key columns came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Config,
    PrimaryIndex,
    OrderingColumns,
}

/// Pick the key columns: configured keys, else the table's primary index,
/// else the ordering columns.
///
/// The primary index lookup is best effort. Only cancellation aborts it.
pub async fn resolve_key_columns(
    reader: &dyn TableReader,
    cancel: &CancellationToken,
    table: &str,
    configured: &[String],
    ordering_columns: &[String],
) -> Result<(Vec<String>, KeySource)> {
    if !configured.is_empty() {
        return Ok((configured.to_vec(), KeySource::Config));
    }

    match reader.primary_index_columns(cancel, table).await {
        Ok(columns) if !columns.is_empty() => {
            info!(table, key_columns = ?columns, "Using primary index columns as record key");
            return Ok((columns, KeySource::PrimaryIndex));
        }
        Ok(_) => {}
        Err(e) if e.is_cancelled() => return Err(e.into()),
        Err(e) => warn!(table, "Cannot read primary index columns: {e}"),
    }

    info!(table, key_columns = ?ordering_columns, "Using ordering columns as record key");
    Ok((ordering_columns.to_vec(), KeySource::OrderingColumns))
}
