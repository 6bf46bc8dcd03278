use connector_core::ConfigError;
use thiserror::Error;

/// Errors returned by the Firebolt destination.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid destination configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("destination is not configured")]
    NotConfigured,

    #[error("destination is not open")]
    NotOpened,

    /// The payload has no fields; there is nothing to insert.
    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload is not a JSON object: {0}")]
    InvalidPayload(String),

    /// None of the known time layouts matched.
    #[error("cannot parse {value:?} as a time value")]
    InvalidTimeLayout { value: String },

    #[error("invalid value type for {column_type} column {column:?}")]
    InvalidTypeForColumn { column: String, column_type: String },

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
