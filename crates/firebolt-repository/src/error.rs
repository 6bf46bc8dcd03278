use thiserror::Error;

/// Errors returned by the repository.
#[derive(Error, Debug)]
pub enum Error {
    #[error("number of columns ({columns}) must be equal to number of values ({values})")]
    ColumnValueMismatch { columns: usize, values: usize },

    #[error("at least one ordering column is required to page through a table")]
    EmptyOrderingColumns,

    #[error("insert requires at least one column")]
    NoColumns,

    #[error("cannot render SQL literal: {0}")]
    UnsupportedValue(String),

    #[error(transparent)]
    Client(#[from] firebolt_client::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
