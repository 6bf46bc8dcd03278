//! Resumable snapshot iterator.
//!
//! Reads a table page by page (`LIMIT batch_size OFFSET batch_id`) in the
//! order given by the ordering columns. Every emitted record carries the
//! `(index_in_batch, batch_id)` pair of its row, so a reader that is set up
//! again with that position continues with the next row.
//!
//! ```text
//! Unstarted ──setup──► Positioned ──has_next=false──► Exhausted
//!                        ▲    │                          │
//!                        └────┘◄──────has_next=true──────┘
//!                 (any) ──stop──► Stopped
//! ```

use chrono::Utc;
use connector_core::{Data, Metadata, Record, Row};
use firebolt_repository::TableReader;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::position::Position;

/// Record metadata key holding the source table.
pub const METADATA_TABLE: &str = "firebolt.table";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Positioned,
    Exhausted,
    Stopped,
}

/// What to read and how.
#[derive(Debug, Clone)]
pub struct IteratorConfig {
    pub table: String,
    /// Columns to select; empty selects all
    pub columns: Vec<String>,
    pub key_columns: Vec<String>,
    pub ordering_columns: Vec<String>,
    pub batch_size: u64,
}

pub struct SnapshotIterator {
    reader: Arc<dyn TableReader>,
    config: IteratorConfig,
    position: Position,
    batch: Vec<Row>,
    state: State,
}

impl SnapshotIterator {
    pub fn new(reader: Arc<dyn TableReader>, config: IteratorConfig) -> Self {
        Self {
            reader,
            config,
            position: Position::default(),
            batch: Vec::new(),
            state: State::Unstarted,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Position of the next row to be emitted.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Restore the cursor and fetch the first page.
    ///
    /// A resume position is the position of the last emitted record, so
    /// reading continues at the row right after it.
    pub async fn setup(
        &mut self,
        cancel: &CancellationToken,
        resume: Option<&connector_core::Position>,
    ) -> Result<()> {
        if self.state == State::Stopped {
            return Err(Error::NotOpened);
        }

        self.position = match resume {
            Some(p) if !p.is_empty() => Position::parse(Some(p))?.next_row()?,
            _ => Position::default(),
        };
        self.advance_full_page()?;

        debug!(
            table = %self.config.table,
            batch_id = self.position.batch_id,
            index_in_batch = self.position.index_in_batch,
            "Setting up snapshot iterator"
        );

        self.fetch(cancel).await?;
        self.state = State::Positioned;
        Ok(())
    }

    /// Whether a row is available, fetching the next page when the current
    /// one is used up. `false` means the end of the table for now; the table
    /// may still grow.
    pub async fn has_next(&mut self, cancel: &CancellationToken) -> Result<bool> {
        match self.state {
            State::Unstarted | State::Stopped => return Err(Error::NotOpened),
            State::Positioned | State::Exhausted => {}
        }

        if self.current_index() < self.batch.len() {
            self.state = State::Positioned;
            return Ok(true);
        }

        self.advance_full_page()?;
        self.fetch(cancel).await?;

        let available = self.current_index() < self.batch.len();
        self.state = if available {
            State::Positioned
        } else {
            debug!(
                table = %self.config.table,
                batch_id = self.position.batch_id,
                index_in_batch = self.position.index_in_batch,
                "No more rows"
            );
            State::Exhausted
        };
        Ok(available)
    }

    /// Emit the current row and move past it.
    ///
    /// Fails without moving when the row lacks a key column.
    pub fn next(&mut self) -> Result<Record> {
        if self.state != State::Positioned {
            return Err(Error::NoRecord);
        }
        let row = self.batch.get(self.current_index()).ok_or(Error::NoRecord)?;

        let mut key = Row::new();
        for column in &self.config.key_columns {
            let value = row.get(column).ok_or_else(|| Error::MissingKey {
                column: column.clone(),
            })?;
            key.insert(column.clone(), value.clone());
        }

        let payload = serde_json::to_vec(row)?;
        let position = self.position.to_record_position()?;

        let mut metadata = Metadata::new();
        metadata.insert(METADATA_TABLE, self.config.table.clone());
        metadata.set_created_at(Utc::now());

        self.position.index_in_batch += 1;

        Ok(Record::snapshot(
            position,
            metadata,
            Data::Structured(key),
            Data::Raw(payload),
        ))
    }

    /// Nothing to confirm on the table side; acknowledgements are only logged.
    pub fn ack(&self, position: &connector_core::Position) {
        debug!(position = %position, "Got ack");
    }

    /// Release the reader. Safe to call more than once.
    pub async fn stop(&mut self) {
        if self.state != State::Stopped {
            self.reader.close().await;
            self.batch.clear();
            self.state = State::Stopped;
        }
    }

    fn current_index(&self) -> usize {
        usize::try_from(self.position.index_in_batch).unwrap_or(usize::MAX)
    }

    /// Move to the next page once the current one has been read in full.
    fn advance_full_page(&mut self) -> Result<()> {
        if self.position.index_in_batch >= self.config.batch_size {
            self.position = Position::new(0, self.position.row_offset()?);
        }
        Ok(())
    }

    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<()> {
        let rows = self
            .reader
            .get_rows(
                cancel,
                &self.config.table,
                &self.config.ordering_columns,
                &self.config.columns,
                self.config.batch_size,
                self.position.batch_id,
            )
            .await
            .inspect_err(|_| {
                debug!(
                    table = %self.config.table,
                    ordering_columns = ?self.config.ordering_columns,
                    columns = ?self.config.columns,
                    batch_size = self.config.batch_size,
                    batch_id = self.position.batch_id,
                    "Get rows failed"
                )
            })?;

        debug!(
            table = %self.config.table,
            batch_id = self.position.batch_id,
            rows = rows.len(),
            "Fetched page"
        );
        self.batch = rows;
        Ok(())
    }
}
