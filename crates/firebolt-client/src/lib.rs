//! Firebolt API client.
//!
//! Handles login and name resolution (account id, engine id, engine
//! endpoint), engine start-up, SQL execution against the engine endpoint and
//! transparent access-token refresh.
//!
//! ```text
//! Client ──► RetryTransport ──► reqwest
//!    ▲              │
//!    └── refresh ◄──┘ (on 401, at most once per call)
//! ```
//!
//! Query results are normalised before they are returned: column names are
//! lower-cased, `UInt8` columns become booleans and date/timestamp columns
//! become [`connector_core::Value::Timestamp`].

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod transport;

pub use client::Client;
pub use config::{
    ClientOptions, ConnectionConfig, LoginParams, DEFAULT_BASE_URL, KEY_ACCOUNT_NAME, KEY_DB,
    KEY_EMAIL, KEY_ENGINE_NAME, KEY_PASSWORD, KEY_TABLE,
};
pub use error::{Error, Result};
pub use models::{ColumnMeta, EngineStatus, QueryResponse, Statistics};
pub use normalize::base_type;
pub use transport::{classify, RetryConfig, RetryTransport, TokenRefresher, Verdict};
