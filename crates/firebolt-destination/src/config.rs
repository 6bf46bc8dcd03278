//! Destination configuration.

use connector_core::{ConfigError, Parameter};
use firebolt_client::ConnectionConfig;
use std::collections::HashMap;

/// The destination only needs the connection settings; the table is the
/// default target and can be overridden per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub connection: ConnectionConfig,
}

impl DestinationConfig {
    pub fn from_map(cfg: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            connection: ConnectionConfig::from_map(cfg)?,
        })
    }

    /// Default target table, lower-cased like the per-record override.
    pub fn table(&self) -> String {
        self.connection.table.to_lowercase()
    }

    pub fn parameters() -> Vec<Parameter> {
        ConnectionConfig::parameters()
    }
}
