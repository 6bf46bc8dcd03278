//! Source configuration.

use connector_core::config::{bounded_int, list};
use connector_core::{ConfigError, Parameter};
use firebolt_client::ConnectionConfig;
use std::collections::HashMap;

pub const KEY_COLUMNS: &str = "columns";
pub const KEY_PRIMARY_KEYS: &str = "primaryKeys";
pub const KEY_ORDERING_COLUMNS: &str = "orderingColumns";
pub const KEY_BATCH_SIZE: &str = "batchSize";

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub connection: ConnectionConfig,
    /// Columns to read; empty means all
    pub columns: Vec<String>,
    /// Key columns set by the user; empty means resolve them at open time
    pub primary_keys: Vec<String>,
    /// Columns giving the table a total order
    pub ordering_columns: Vec<String>,
    pub batch_size: u64,
}

/// Column names are compared against lower-cased result columns.
fn lowercased(cfg: &HashMap<String, String>, key: &str) -> Vec<String> {
    list(cfg, key).into_iter().map(|c| c.to_lowercase()).collect()
}

impl SourceConfig {
    pub fn from_map(cfg: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let connection = ConnectionConfig::from_map(cfg)?;

        let ordering_columns = lowercased(cfg, KEY_ORDERING_COLUMNS);
        if ordering_columns.is_empty() {
            return Err(ConfigError::Missing(KEY_ORDERING_COLUMNS));
        }

        let columns = lowercased(cfg, KEY_COLUMNS);
        let primary_keys = lowercased(cfg, KEY_PRIMARY_KEYS);

        if !columns.is_empty() {
            if let Some(key) = primary_keys.iter().find(|k| !columns.contains(k)) {
                return Err(ConfigError::Invalid {
                    key: KEY_PRIMARY_KEYS,
                    reason: format!("{key:?} is not one of the selected columns"),
                });
            }
        }

        let batch_size = bounded_int(cfg, KEY_BATCH_SIZE, DEFAULT_BATCH_SIZE, 1, MAX_BATCH_SIZE)?;

        Ok(Self {
            connection,
            columns,
            primary_keys,
            ordering_columns,
            batch_size: batch_size as u64,
        })
    }

    pub fn parameters() -> Vec<Parameter> {
        let mut params = ConnectionConfig::parameters();
        params.extend([
            Parameter::optional(
                KEY_COLUMNS,
                "",
                "Comma separated list of column names that should be included in each record's payload.",
            ),
            Parameter::optional(
                KEY_PRIMARY_KEYS,
                "",
                "Comma separated list of columns that records should use for their key fields. \
                 Defaults to the table's primary index, then to the ordering columns.",
            ),
            Parameter::required(
                KEY_ORDERING_COLUMNS,
                "Comma separated list of columns giving the table a stable order.",
            ),
            Parameter::optional(KEY_BATCH_SIZE, "100", "Number of rows fetched per query (1-100)."),
        ]);
        params
    }
}
