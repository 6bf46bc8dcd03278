//! Connection settings shared by the source and the destination.

use connector_core::config::{required, ConfigError};
use connector_core::Parameter;
use std::collections::HashMap;
use std::time::Duration;

use crate::transport::RetryConfig;

pub const KEY_EMAIL: &str = "email";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_ACCOUNT_NAME: &str = "accountName";
pub const KEY_ENGINE_NAME: &str = "engineName";
pub const KEY_DB: &str = "db";
pub const KEY_TABLE: &str = "table";

pub const DEFAULT_BASE_URL: &str = "https://api.app.firebolt.io";

/// Credentials and target names, parsed from the host configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub email: String,
    pub password: String,
    pub account_name: String,
    pub engine_name: String,
    pub database: String,
    pub table: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("account_name", &self.account_name)
            .field("engine_name", &self.engine_name)
            .field("database", &self.database)
            .field("table", &self.table)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn from_map(cfg: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let email = required(cfg, KEY_EMAIL)?;
        if !looks_like_email(&email) {
            return Err(ConfigError::Invalid {
                key: KEY_EMAIL,
                reason: format!("{email:?} is not an email address"),
            });
        }

        Ok(Self {
            email,
            password: required(cfg, KEY_PASSWORD)?,
            account_name: required(cfg, KEY_ACCOUNT_NAME)?,
            engine_name: required(cfg, KEY_ENGINE_NAME)?,
            database: required(cfg, KEY_DB)?,
            table: required(cfg, KEY_TABLE)?,
        })
    }

    pub fn login_params(&self) -> LoginParams {
        LoginParams {
            email: self.email.clone(),
            password: self.password.clone(),
            account_name: self.account_name.clone(),
            engine_name: self.engine_name.clone(),
        }
    }

    /// Parameter descriptions for the keys parsed by [`ConnectionConfig::from_map`].
    pub fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::required(KEY_EMAIL, "The Firebolt email account."),
            Parameter::required(KEY_PASSWORD, "The Firebolt account password."),
            Parameter::required(KEY_ACCOUNT_NAME, "The Firebolt account name."),
            Parameter::required(KEY_ENGINE_NAME, "The Firebolt engine name."),
            Parameter::required(KEY_DB, "The Firebolt database name."),
            Parameter::required(KEY_TABLE, "The table name."),
        ]
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Input of [`crate::Client::login`].
#[derive(Clone)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
    pub account_name: String,
    pub engine_name: String,
}

impl std::fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginParams")
            .field("email", &self.email)
            .field("account_name", &self.account_name)
            .field("engine_name", &self.engine_name)
            .finish_non_exhaustive()
    }
}

/// Client tunables that are not part of the host configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API base URL, without trailing slash
    pub base_url: String,
    pub retry: RetryConfig,
    /// Delay between engine status checks while waiting for start-up
    pub engine_poll_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
            engine_poll_interval: Duration::from_secs(5),
        }
    }
}
