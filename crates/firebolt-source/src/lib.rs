//! Firebolt snapshot source.
//!
//! Reads a table in pages ordered by the configured ordering columns and
//! emits one snapshot record per row. Each record's position identifies the
//! row, and opening the source at that position continues with the row
//! after it. Reaching the end of the table is not terminal: `read` returns
//! `Ok(None)` and later calls pick up rows appended in the meantime.
//!
//! ```rust,ignore
//! let mut source = FireboltSource::new();
//! source.configure(&config)?;
//! source.open(&cancel, stored_position.as_ref()).await?;
//! while let Some(record) = source.read(&cancel).await? {
//!     // ...
//!     source.ack(&cancel, &record.position).await?;
//! }
//! source.teardown(&cancel).await?;
//! ```

pub mod config;
pub mod error;
pub mod iterator;
pub mod keys;
pub mod position;
pub mod source;

#[cfg(test)]
mod testing;

pub use config::SourceConfig;
pub use error::{Error, Result};
pub use iterator::{IteratorConfig, SnapshotIterator, State, METADATA_TABLE};
pub use keys::{resolve_key_columns, KeySource};
pub use position::Position;
pub use source::{FireboltSource, DEFAULT_ENGINE_START_TIMEOUT};
