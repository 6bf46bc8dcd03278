//! Checkpoint storage trait and types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoint identifier for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointID {
    /// Connector type (e.g., "firebolt")
    pub connector: String,
    /// What is being read, usually `<database>.<table>`
    pub stream: String,
}

impl CheckpointID {
    pub fn new(connector: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            stream: stream.into(),
        }
    }
}

/// Checkpoint data stored in backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCheckpoint {
    /// Serialized checkpoint
    pub checkpoint_data: String,
    /// Connector type for validation
    pub connector: String,
    /// Stream for validation
    pub stream: String,
    /// Timestamp when checkpoint was created
    pub created_at: DateTime<Utc>,
}

/// Trait for checkpoint storage operations.
///
/// Only the latest checkpoint per [`CheckpointID`] is kept; storing replaces
/// the previous one.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint in the storage backend.
    async fn store_checkpoint(&self, id: &CheckpointID, checkpoint_data: String) -> Result<()>;

    /// Read a checkpoint from the storage backend.
    ///
    /// Returns None if the checkpoint doesn't exist.
    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<StoredCheckpoint>>;
}

/// Store that keeps nothing. Used when checkpointing is disabled.
pub struct NullStore;

#[async_trait]
impl CheckpointStore for NullStore {
    async fn store_checkpoint(&self, _id: &CheckpointID, _checkpoint_data: String) -> Result<()> {
        Ok(())
    }

    async fn read_checkpoint(&self, _id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        Ok(None)
    }
}
