//! Unit tests for the checkpoint crate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;

use crate::{Checkpoint, CheckpointID, CheckpointManager, CheckpointStore, FilesystemStore, NullStore};

/// Test checkpoint type for unit tests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct TestCheckpoint {
    page: u64,
    row: u64,
}

impl Checkpoint for TestCheckpoint {
    const CONNECTOR: &'static str = "test";

    fn to_cli_string(&self) -> String {
        format!("{}:{}", self.page, self.row)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (page, row) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid test checkpoint format: expected 'page:row'"))?;
        Ok(Self {
            page: page.parse()?,
            row: row.parse()?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct OtherCheckpoint {
    page: u64,
    row: u64,
}

impl Checkpoint for OtherCheckpoint {
    const CONNECTOR: &'static str = "other";

    fn to_cli_string(&self) -> String {
        String::new()
    }

    fn from_cli_string(_s: &str) -> anyhow::Result<Self> {
        anyhow::bail!("unsupported")
    }
}

#[test]
fn test_cli_string_roundtrip() {
    let cp = TestCheckpoint { page: 200, row: 7 };
    let parsed = TestCheckpoint::from_cli_string(&cp.to_cli_string()).unwrap();
    assert_eq!(parsed, cp);
    assert!(TestCheckpoint::from_cli_string("garbage").is_err());
}

#[tokio::test]
async fn test_filesystem_store_keeps_latest() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path().join("nested"));
    let id = CheckpointID::new("test", "db.users");

    assert!(store.read_checkpoint(&id).await.unwrap().is_none());

    store.store_checkpoint(&id, "first".to_string()).await.unwrap();
    store.store_checkpoint(&id, "second".to_string()).await.unwrap();

    let stored = store.read_checkpoint(&id).await.unwrap().unwrap();
    assert_eq!(stored.checkpoint_data, "second");
    assert_eq!(stored.stream, "db.users");

    // one file per id, no leftovers from the temporary write
    let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_filesystem_store_separates_streams() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path());

    let users = CheckpointID::new("test", "db.users");
    let orders = CheckpointID::new("test", "db/orders");
    store.store_checkpoint(&users, "u".to_string()).await.unwrap();
    store.store_checkpoint(&orders, "o".to_string()).await.unwrap();

    assert_eq!(
        store.read_checkpoint(&users).await.unwrap().unwrap().checkpoint_data,
        "u"
    );
    assert_eq!(
        store.read_checkpoint(&orders).await.unwrap().unwrap().checkpoint_data,
        "o"
    );
}

#[tokio::test]
async fn test_manager_roundtrip() {
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(Arc::new(FilesystemStore::new(dir.path())), "db.users");

    assert_eq!(manager.load::<TestCheckpoint>().await.unwrap(), None);

    let cp = TestCheckpoint { page: 100, row: 42 };
    manager.save(&cp).await.unwrap();
    assert_eq!(manager.load::<TestCheckpoint>().await.unwrap(), Some(cp));

    // a different connector type does not see it
    assert_eq!(manager.load::<OtherCheckpoint>().await.unwrap(), None);
}

#[tokio::test]
async fn test_null_store() {
    let manager = CheckpointManager::new(Arc::new(NullStore), "db.users");
    manager
        .save(&TestCheckpoint { page: 0, row: 1 })
        .await
        .unwrap();
    assert_eq!(manager.load::<TestCheckpoint>().await.unwrap(), None);
}
