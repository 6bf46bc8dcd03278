//! Firebolt connector host
//!
//! Drives the Firebolt source and destination from the command line:
//!
//! - `snapshot` reads a table and prints one JSON record per line,
//!   remembering the last acknowledged position between runs
//! - `load` inserts JSON objects, one per line, into a table
//!
//! # CLI Usage
//!
//! ```bash
//! # Snapshot a table, resuming where the previous run stopped
//! firebolt-connector snapshot \
//!   --email me@example.com --account-name acc --engine-name eng \
//!   --database db --table events --ordering-columns id
//!
//! # Load rows from a JSONL file
//! firebolt-connector load --table events --input rows.jsonl ...
//! ```

use clap::Parser;
use std::collections::HashMap;

pub mod load;
pub mod snapshot;

pub use load::run_load;
pub use snapshot::{run_snapshot, SnapshotSettings};

#[derive(Parser, Clone)]
pub struct ConnectionOpts {
    /// Firebolt account email
    #[arg(long, env = "FIREBOLT_EMAIL")]
    pub email: String,

    /// Firebolt account password
    #[arg(long, env = "FIREBOLT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Firebolt account name
    #[arg(long, env = "FIREBOLT_ACCOUNT_NAME")]
    pub account_name: String,

    /// Engine running the queries
    #[arg(long, env = "FIREBOLT_ENGINE_NAME")]
    pub engine_name: String,

    /// Database name
    #[arg(long, env = "FIREBOLT_DATABASE")]
    pub database: String,

    /// Table to read from or write to
    #[arg(long, env = "FIREBOLT_TABLE")]
    pub table: String,

    /// API base URL
    #[arg(long, default_value = firebolt_client::DEFAULT_BASE_URL, env = "FIREBOLT_API_URL")]
    pub api_url: String,

    /// Maximum time to wait for the engine to start, in seconds
    #[arg(long, default_value = "600")]
    pub engine_start_timeout: u64,
}

impl ConnectionOpts {
    /// Connector configuration map understood by both connectors.
    pub fn to_config(&self) -> HashMap<String, String> {
        [
            (firebolt_client::KEY_EMAIL, &self.email),
            (firebolt_client::KEY_PASSWORD, &self.password),
            (firebolt_client::KEY_ACCOUNT_NAME, &self.account_name),
            (firebolt_client::KEY_ENGINE_NAME, &self.engine_name),
            (firebolt_client::KEY_DB, &self.database),
            (firebolt_client::KEY_TABLE, &self.table),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }

    pub fn client_options(&self) -> firebolt_client::ClientOptions {
        firebolt_client::ClientOptions {
            base_url: self.api_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn engine_start_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.engine_start_timeout)
    }
}

#[derive(Parser, Clone)]
pub struct ReadOpts {
    /// Columns to include in each payload (comma-separated, empty means all)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Columns forming the record key (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub primary_keys: Vec<String>,

    /// Columns giving the table a stable order (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub ordering_columns: Vec<String>,

    /// Rows fetched per query (1-100)
    #[arg(long, default_value = "100")]
    pub batch_size: u32,
}

impl ReadOpts {
    /// Add the source keys to a connection configuration map.
    pub fn extend_config(&self, config: &mut HashMap<String, String>) {
        let source_keys = [
            (firebolt_source::config::KEY_COLUMNS, self.columns.join(",")),
            (
                firebolt_source::config::KEY_PRIMARY_KEYS,
                self.primary_keys.join(","),
            ),
            (
                firebolt_source::config::KEY_ORDERING_COLUMNS,
                self.ordering_columns.join(","),
            ),
            (
                firebolt_source::config::KEY_BATCH_SIZE,
                self.batch_size.to_string(),
            ),
        ];
        for (key, value) in source_keys {
            if !value.is_empty() {
                config.insert(key.to_string(), value);
            }
        }
    }
}
