//! Checkpoint management for the connector host
//!
//! The host acknowledges every record it has processed and stores the
//! record's position here, so that the next run can resume right after it.
//!
//! # Architecture
//!
//! - The `Checkpoint` trait is implemented by connector-specific position types
//! - `CheckpointManager` saves and loads typed checkpoints for one stream
//! - `CheckpointStore` abstracts the storage backend
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores checkpoints as JSON files
//! - `NullStore` - Stores nothing (checkpointing disabled)

mod filesystem;
mod manager;
pub mod store;

#[cfg(test)]
mod tests;

pub use filesystem::FilesystemStore;
pub use manager::CheckpointManager;
pub use store::{CheckpointID, CheckpointStore, NullStore, StoredCheckpoint};

/// Trait that connector-specific checkpoints must implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct OffsetCheckpoint {
///     pub offset: u64,
/// }
///
/// impl Checkpoint for OffsetCheckpoint {
///     const CONNECTOR: &'static str = "offset";
///
///     fn to_cli_string(&self) -> String {
///         self.offset.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { offset: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Connector type identifier (e.g., "firebolt").
    ///
    /// Stored next to the checkpoint and checked when loading it.
    const CONNECTOR: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format (e.g. a `--resume-from` argument).
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
