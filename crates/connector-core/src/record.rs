//! Records exchanged with the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Row;

/// Metadata key holding the record creation time (Unix nanoseconds).
pub const METADATA_CREATED_AT: &str = "opencdc.createdAt";

/// Opaque resume token.
///
/// The host stores and returns these bytes verbatim; only the connector
/// that produced a position knows how to interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position(Vec<u8>);

impl Position {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Row read as part of a full table snapshot
    Snapshot,
    /// Row created
    Create,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

/// String key/value metadata attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Record the creation time of the record.
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        let nanos = at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| at.timestamp_millis() * 1_000_000);
        self.insert(METADATA_CREATED_AT, nanos.to_string());
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let nanos: i64 = self.get(METADATA_CREATED_AT)?.parse().ok()?;
        Some(DateTime::from_timestamp_nanos(nanos))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Record key or payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Data {
    /// Raw bytes, usually JSON
    Raw(Vec<u8>),
    /// Already structured column map
    Structured(Row),
}

impl Default for Data {
    fn default() -> Self {
        Data::Raw(Vec::new())
    }
}

impl Data {
    /// Serialized form of the data. Structured data is encoded as JSON.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Data::Raw(bytes) => Ok(bytes.clone()),
            Data::Structured(row) => serde_json::to_vec(row),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Data::Raw(bytes) => bytes.is_empty(),
            Data::Structured(row) => row.is_empty(),
        }
    }
}

/// A single unit of data moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub position: Position,
    pub operation: Operation,
    pub metadata: Metadata,
    pub key: Data,
    /// Row contents after the operation.
    pub payload: Data,
}

impl Record {
    /// Build a snapshot record as emitted by a source reading a table.
    pub fn snapshot(position: Position, metadata: Metadata, key: Data, payload: Data) -> Self {
        Self {
            position,
            operation: Operation::Snapshot,
            metadata,
            key,
            payload,
        }
    }

    /// Build a create record, the only kind a destination is expected to write.
    pub fn create(metadata: Metadata, payload: Data) -> Self {
        Self {
            position: Position::default(),
            operation: Operation::Create,
            metadata,
            key: Data::default(),
            payload,
        }
    }
}
