//! Lifecycle traits implemented by connectors.
//!
//! Every method is required; there is no default "unimplemented" behaviour
//! to inherit. The host calls these serially on a single instance.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::config::Parameter;
use crate::record::{Position, Record};

/// A connector that reads records out of an external system.
#[async_trait]
pub trait Source: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Configuration keys understood by this source.
    fn parameters(&self) -> Vec<Parameter>;

    /// Parse and validate the configuration map.
    fn configure(&mut self, config: &HashMap<String, String>) -> Result<(), Self::Error>;

    /// Connect and position the reader. `None` means start from the beginning.
    async fn open(
        &mut self,
        cancel: &CancellationToken,
        position: Option<&Position>,
    ) -> Result<(), Self::Error>;

    /// Read the next record.
    ///
    /// `Ok(None)` means no data is available right now; the host should
    /// back off and call `read` again later.
    async fn read(&mut self, cancel: &CancellationToken) -> Result<Option<Record>, Self::Error>;

    /// Acknowledge that the record at `position` has been durably processed.
    async fn ack(
        &mut self,
        cancel: &CancellationToken,
        position: &Position,
    ) -> Result<(), Self::Error>;

    /// Release all resources.
    async fn teardown(&mut self, cancel: &CancellationToken) -> Result<(), Self::Error>;
}

/// A connector that writes records into an external system.
#[async_trait]
pub trait Destination: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Configuration keys understood by this destination.
    fn parameters(&self) -> Vec<Parameter>;

    /// Parse and validate the configuration map.
    fn configure(&mut self, config: &HashMap<String, String>) -> Result<(), Self::Error>;

    /// Connect and prepare to accept writes.
    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), Self::Error>;

    /// Persist one record.
    async fn write(&mut self, cancel: &CancellationToken, record: &Record)
        -> Result<(), Self::Error>;

    /// Release all resources.
    async fn teardown(&mut self, cancel: &CancellationToken) -> Result<(), Self::Error>;
}
