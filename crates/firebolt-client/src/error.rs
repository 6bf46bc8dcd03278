use thiserror::Error;

/// Errors returned by the Firebolt API client.
#[derive(Error, Debug)]
pub enum Error {
    /// The login endpoint rejected the credentials.
    #[error("authentication failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    /// A name → id/url lookup came back empty.
    #[error("cannot determine {what} for {name:?}")]
    Resolution { what: &'static str, name: String },

    #[error("account id or engine id is empty, login wasn't successful")]
    NotLoggedIn,

    #[error("invalid http status code {status}, body: {body}")]
    InvalidStatus { status: u16, body: String },

    /// The caller cancelled the operation. Never wrapped, never retried.
    #[error("operation cancelled")]
    Cancelled,

    #[error("client is closed")]
    Closed,

    /// The engine did not reach the running state in time.
    #[error("engine did not start within {0:?}")]
    EngineStartTimeout(std::time::Duration),

    #[error("refresh token: {0}")]
    TokenRefresh(#[source] Box<Error>),

    /// Another error annotated with the call that produced it.
    #[error("{call}: {source}")]
    Call {
        call: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request body cannot be cloned for retry")]
    UnclonableRequest,

    #[error("normalize column {column:?}: {reason}")]
    Normalize { column: String, reason: String },
}

impl Error {
    /// Annotate with the call that failed. Cancellation passes through as is.
    pub fn context(self, call: &'static str) -> Self {
        match self {
            Error::Cancelled => Error::Cancelled,
            other => Error::Call {
                call,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping `Call` annotations.
    pub fn root(&self) -> &Error {
        match self {
            Error::Call { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self.root() {
            Error::Cancelled => true,
            Error::TokenRefresh(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
