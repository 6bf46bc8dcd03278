//! Snapshot cursor position.

use checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the snapshot iterator is in the table.
///
/// `batch_id` is the row offset of the current page and `index_in_batch` the
/// row within that page, so the row offset is their sum. Encoded as JSON
/// when handed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub index_in_batch: u64,
    pub batch_id: u64,
}

impl Position {
    pub fn new(index_in_batch: u64, batch_id: u64) -> Self {
        Self {
            index_in_batch,
            batch_id,
        }
    }

    /// Parse a host position. Absent or empty means the start of the table.
    pub fn parse(position: Option<&connector_core::Position>) -> Result<Self> {
        match position {
            Some(p) if !p.is_empty() => serde_json::from_slice(p.as_bytes()).map_err(Error::Position),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_record_position(&self) -> Result<connector_core::Position> {
        Ok(connector_core::Position::new(serde_json::to_vec(self)?))
    }

    /// Offset of the row this position points at.
    pub fn row_offset(&self) -> Result<u64> {
        self.batch_id
            .checked_add(self.index_in_batch)
            .ok_or_else(|| self.overflow())
    }

    /// The position of the row after this one.
    pub fn next_row(&self) -> Result<Self> {
        let index_in_batch = self.index_in_batch.checked_add(1).ok_or_else(|| self.overflow())?;
        Ok(Self::new(index_in_batch, self.batch_id))
    }

    fn overflow(&self) -> Error {
        Error::PositionOverflow {
            index_in_batch: self.index_in_batch,
            batch_id: self.batch_id,
        }
    }
}

impl Checkpoint for Position {
    const CONNECTOR: &'static str = "firebolt";

    fn to_cli_string(&self) -> String {
        format!("{}:{}", self.batch_id, self.index_in_batch)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (batch_id, index) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid position {s:?}, expected 'batch_id:index'"))?;
        Ok(Self {
            index_in_batch: index.trim().parse()?,
            batch_id: batch_id.trim().parse()?,
        })
    }
}
