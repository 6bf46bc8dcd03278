//! Helpers for string-keyed connector configuration.

use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while parsing a configuration map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config value {0:?}")]
    Missing(&'static str),

    #[error("invalid config value {key:?}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Description of one configuration key, as presented by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub default: &'static str,
    pub required: bool,
    pub description: &'static str,
}

impl Parameter {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            default: "",
            required: true,
            description,
        }
    }

    pub const fn optional(
        name: &'static str,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            default,
            required: false,
            description,
        }
    }
}

/// Fetch a required, non-blank value.
pub fn required(cfg: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    match cfg.get(key).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

/// Fetch an optional value; blank counts as absent.
pub fn optional(cfg: &HashMap<String, String>, key: &str) -> Option<String> {
    cfg.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a comma-separated list. Items are trimmed and blanks dropped.
pub fn list(cfg: &HashMap<String, String>, key: &str) -> Vec<String> {
    optional(cfg, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse an integer value within `min..=max`, falling back to `default`
/// when the key is absent.
pub fn bounded_int(
    cfg: &HashMap<String, String>,
    key: &'static str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = optional(cfg, key) else {
        return Ok(default);
    };

    let value: usize = raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("{raw:?} is not a positive integer"),
    })?;

    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{value} is out of range {min}..={max}"),
        });
    }

    Ok(value)
}
