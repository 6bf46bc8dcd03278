use connector_core::ConfigError;
use thiserror::Error;

/// Errors returned by the Firebolt source.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid source configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("source is not configured")]
    NotConfigured,

    #[error("source is not open")]
    NotOpened,

    #[error("parse position: {0}")]
    Position(#[source] serde_json::Error),

    /// The position points past the largest addressable row.
    #[error("position batch_id={batch_id} index_in_batch={index_in_batch} is out of range")]
    PositionOverflow { index_in_batch: u64, batch_id: u64 },

    /// The row does not contain one of the key columns.
    #[error("key column {column:?} doesn't exist in the row")]
    MissingKey { column: String },

    /// `next` was called without a row being available.
    #[error("no record available, call has_next first")]
    NoRecord,

    #[error("serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] firebolt_repository::Error),

    #[error(transparent)]
    Client(#[from] firebolt_client::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Repository(e) => e.is_cancelled(),
            Error::Client(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
