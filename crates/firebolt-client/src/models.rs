//! Wire models of the Firebolt REST API.

use connector_core::Row;
use serde::{Deserialize, Serialize};

const ENGINE_STATUS_RUNNING: &str = "ENGINE_STATUS_RUNNING_REVISION_SERVING";
const ENGINE_STATUS_TERMINATION_STARTED: &str = "ENGINE_STATUS_TERMINATION_STARTED";
const ENGINE_STATUS_TERMINATION_FINISHED: &str = "ENGINE_STATUS_TERMINATION_FINISHED";
const ENGINE_STATUS_TERMINATION_FAILED: &str = "ENGINE_STATUS_TERMINATION_FAILED";

/// Lifecycle state of an engine as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum EngineStatus {
    /// Engine is up and serving queries
    Running,
    /// Shutdown in progress
    Terminating,
    /// Engine stopped cleanly
    TerminationFinished,
    /// Engine stopped with an error
    TerminationFailed,
    /// Any other (transitional) state, kept verbatim
    Other(String),
    #[default]
    Unknown,
}

impl EngineStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, EngineStatus::Running)
    }

    /// Terminated engines (successfully or not) have to be started again.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self,
            EngineStatus::TerminationFinished | EngineStatus::TerminationFailed
        )
    }
}

impl From<String> for EngineStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            ENGINE_STATUS_RUNNING => EngineStatus::Running,
            ENGINE_STATUS_TERMINATION_STARTED => EngineStatus::Terminating,
            ENGINE_STATUS_TERMINATION_FINISHED => EngineStatus::TerminationFinished,
            ENGINE_STATUS_TERMINATION_FAILED => EngineStatus::TerminationFailed,
            "" => EngineStatus::Unknown,
            _ => EngineStatus::Other(raw),
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Running => write!(f, "{ENGINE_STATUS_RUNNING}"),
            EngineStatus::Terminating => write!(f, "{ENGINE_STATUS_TERMINATION_STARTED}"),
            EngineStatus::TerminationFinished => write!(f, "{ENGINE_STATUS_TERMINATION_FINISHED}"),
            EngineStatus::TerminationFailed => write!(f, "{ENGINE_STATUS_TERMINATION_FAILED}"),
            EngineStatus::Other(raw) => write!(f, "{raw}"),
            EngineStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AccountIdByNameResponse {
    #[serde(default)]
    pub account_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineIdByNameResponse {
    #[serde(default)]
    pub engine_id: EngineId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineId {
    #[serde(default)]
    pub engine_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineResponse {
    #[serde(default)]
    pub engine: Engine,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Engine {
    #[serde(default)]
    pub current_status: EngineStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineUrlByNameResponse {
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Edge {
    #[serde(default)]
    pub node: Node,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Node {
    #[serde(default)]
    pub endpoint: String,
}

/// Result of running one SQL statement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    /// Column names and service-side types, in select order
    #[serde(default)]
    pub meta: Vec<ColumnMeta>,
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub rows_read: u64,
    #[serde(default)]
    pub bytes_read: u64,
}
