//! Record to row conversion and insertion.

use connector_core::{Data, Record, Row, Value};
use firebolt_client::base_type;
use firebolt_repository::TableWriter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::layouts::{parse_time, DATE_FORMAT, TIMESTAMP_FORMAT};

/// Metadata key overriding the target table of a single record.
pub const METADATA_TABLE: &str = "firebolt.table";

/// Column types that need their values reformatted before insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Date,
    Timestamp,
}

impl Coercion {
    fn for_type(column_type: &str) -> Option<Self> {
        match base_type(column_type).as_str() {
            "date" | "pgdate" | "date_ext" => Some(Coercion::Date),
            "datetime" | "datetime64" | "timestamp" | "timestampntz" | "timestamptz"
            | "timestamp_ext" => Some(Coercion::Timestamp),
            _ => None,
        }
    }

    fn format(self) -> &'static str {
        match self {
            Coercion::Date => DATE_FORMAT,
            Coercion::Timestamp => TIMESTAMP_FORMAT,
        }
    }
}

/// Inserts records as rows, one INSERT per record.
pub struct Writer {
    table_writer: Arc<dyn TableWriter>,
    table: String,
    /// table → (lower-cased column → type)
    column_types: HashMap<String, HashMap<String, String>>,
}

impl Writer {
    pub fn new(table_writer: Arc<dyn TableWriter>, table: impl Into<String>) -> Self {
        Self {
            table_writer,
            table: table.into(),
            column_types: HashMap::new(),
        }
    }

    /// Default target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Target table of `record`: the metadata override, else the default.
    pub fn table_for(&self, record: &Record) -> String {
        match record.metadata.get(METADATA_TABLE) {
            Some(table) if !table.trim().is_empty() => table.trim().to_lowercase(),
            _ => self.table.clone(),
        }
    }

    /// Fetch and cache the column types of `table`.
    pub async fn load_column_types(
        &mut self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<&HashMap<String, String>> {
        if !self.column_types.contains_key(table) {
            let types = self.table_writer.get_column_types(cancel, table).await?;
            debug!(table, columns = types.len(), "Loaded column types");
            self.column_types.insert(table.to_string(), types);
        }
        Ok(&self.column_types[table])
    }

    /// Convert `record` into a row and insert it.
    ///
    /// An empty payload fails with [`Error::EmptyPayload`] before anything
    /// is sent.
    pub async fn insert_record(&mut self, cancel: &CancellationToken, record: &Record) -> Result<()> {
        let table = self.table_for(record);
        let row = structurize(&record.payload)?;

        let column_types = self.load_column_types(cancel, &table).await?;
        let row = coerce_row(row, column_types)?;

        let (columns, values): (Vec<String>, Vec<Value>) = row.into_iter().unzip();
        self.table_writer
            .insert_row(cancel, &table, &columns, &values)
            .await?;

        debug!(table = %table, columns = columns.len(), "Inserted row");
        Ok(())
    }

    pub async fn close(&self) {
        self.table_writer.close().await
    }
}

/// Decode the payload into a row with lower-cased column names and nested
/// values flattened to JSON text.
fn structurize(payload: &Data) -> Result<Row> {
    let fields: Row = match payload {
        Data::Structured(row) => row.clone(),
        Data::Raw(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Row::new(),
        Data::Raw(bytes) => match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(serde_json::Value::Object(map)) => {
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
            }
            Ok(serde_json::Value::Null) => Row::new(),
            Ok(other) => {
                return Err(Error::InvalidPayload(format!(
                    "expected an object, got {other}"
                )))
            }
            Err(e) => return Err(Error::InvalidPayload(e.to_string())),
        },
    };

    if fields.is_empty() {
        return Err(Error::EmptyPayload);
    }

    Ok(fields
        .into_iter()
        .map(|(name, value)| {
            let value = if value.is_nested() {
                Value::String(value.to_json().to_string())
            } else {
                value
            };
            (name.to_lowercase(), value)
        })
        .collect())
}

fn coerce_row(row: Row, column_types: &HashMap<String, String>) -> Result<Row> {
    row.into_iter()
        .map(|(column, value)| {
            let coercion = column_types
                .get(&column)
                .and_then(|t| Coercion::for_type(t).map(|c| (c, t)));
            let value = match coercion {
                Some((coercion, column_type)) => coerce_value(&column, column_type, coercion, value)?,
                None => value,
            };
            Ok((column, value))
        })
        .collect()
}

fn coerce_value(column: &str, column_type: &str, coercion: Coercion, value: Value) -> Result<Value> {
    let formatted = match &value {
        Value::Null => return Ok(Value::Null),
        Value::Timestamp(ts) => ts.naive_utc().format(coercion.format()).to_string(),
        Value::String(s) => parse_time(s)?.format(coercion.format()).to_string(),
        _ => {
            return Err(Error::InvalidTypeForColumn {
                column: column.to_string(),
                column_type: column_type.to_string(),
            })
        }
    };
    Ok(Value::String(formatted))
}
