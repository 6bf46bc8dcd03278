//! Typed checkpoint saving and loading.

use std::sync::Arc;

use crate::store::{CheckpointID, CheckpointStore};
use crate::Checkpoint;

/// Saves and loads the checkpoint of a single stream.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{CheckpointManager, FilesystemStore};
///
/// let manager = CheckpointManager::new(Arc::new(FilesystemStore::new(".checkpoints")), "db.users");
/// manager.save(&position).await?;
/// let resumed: Option<Position> = manager.load().await?;
/// ```
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    stream: String,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, stream: impl Into<String>) -> Self {
        Self {
            store,
            stream: stream.into(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    fn id<C: Checkpoint>(&self) -> CheckpointID {
        CheckpointID::new(C::CONNECTOR, self.stream.clone())
    }

    /// Replace the stored checkpoint.
    pub async fn save<C: Checkpoint>(&self, checkpoint: &C) -> anyhow::Result<()> {
        let data = serde_json::to_string(checkpoint)?;
        self.store.store_checkpoint(&self.id::<C>(), data).await?;

        tracing::debug!(
            "Saved {} checkpoint for {}: {}",
            C::CONNECTOR,
            self.stream,
            checkpoint.to_cli_string()
        );
        Ok(())
    }

    /// Latest stored checkpoint, if any.
    pub async fn load<C: Checkpoint>(&self) -> anyhow::Result<Option<C>> {
        let Some(stored) = self.store.read_checkpoint(&self.id::<C>()).await? else {
            return Ok(None);
        };

        if stored.connector != C::CONNECTOR {
            anyhow::bail!(
                "Checkpoint connector mismatch: expected '{}', found '{}'",
                C::CONNECTOR,
                stored.connector
            );
        }

        let checkpoint: C = serde_json::from_str(&stored.checkpoint_data)?;
        tracing::info!(
            "Loaded {} checkpoint for {} (stored {}): {}",
            C::CONNECTOR,
            self.stream,
            stored.created_at,
            checkpoint.to_cli_string()
        );
        Ok(Some(checkpoint))
    }
}
