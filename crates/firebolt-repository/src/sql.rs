//! SQL text rendering.
//!
//! Statements are sent to the engine as plain text, so values are inlined as
//! literals. Identifiers that are plain words are left bare (Firebolt folds
//! them to lower case); anything else is double-quoted.

use chrono::{DateTime, Utc};
use connector_core::Value;

use crate::error::{Error, Result};

/// Timestamp literal format accepted by DATE and TIMESTAMP columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render one identifier part.
pub fn identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Render a possibly schema-qualified table name.
pub fn table_name(table: &str) -> String {
    table
        .split('.')
        .map(identifier)
        .collect::<Vec<_>>()
        .join(".")
}

fn identifier_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string literal.
pub fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn timestamp_literal(ts: &DateTime<Utc>) -> String {
    string_literal(&ts.format(TIMESTAMP_FORMAT).to_string())
}

/// Render a value as a SQL literal.
pub fn literal(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) if f.is_finite() => {
            let s = f.to_string();
            // keep floats recognisable as such
            if s.contains(['.', 'e', 'E']) {
                s
            } else {
                format!("{s}.0")
            }
        }
        Value::Float(f) => {
            return Err(Error::UnsupportedValue(format!(
                "non-finite float {f} has no SQL literal"
            )))
        }
        Value::String(s) => string_literal(s),
        Value::Timestamp(ts) => timestamp_literal(ts),
        Value::Array(items) => {
            let rendered = items.iter().map(literal).collect::<Result<Vec<_>>>()?;
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(_) => string_literal(&value.to_json().to_string()),
    })
}

/// `SELECT` one page of a table in a stable order.
pub fn select_page(
    table: &str,
    ordering_columns: &[String],
    columns: &[String],
    limit: u64,
    offset: u64,
) -> Result<String> {
    if ordering_columns.is_empty() {
        return Err(Error::EmptyOrderingColumns);
    }

    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        identifier_list(columns)
    };

    Ok(format!(
        "SELECT {projection} FROM {} ORDER BY {} LIMIT {limit} OFFSET {offset}",
        table_name(table),
        identifier_list(ordering_columns),
    ))
}

/// `INSERT` a single row.
pub fn insert_row(table: &str, columns: &[String], values: &[Value]) -> Result<String> {
    if columns.len() != values.len() {
        return Err(Error::ColumnValueMismatch {
            columns: columns.len(),
            values: values.len(),
        });
    }
    if columns.is_empty() {
        return Err(Error::NoColumns);
    }

    let rendered = values.iter().map(literal).collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name(table),
        identifier_list(columns),
        rendered.join(", "),
    ))
}

/// Column names and types of a table.
pub fn describe(table: &str) -> String {
    format!("DESCRIBE {}", table_name(table))
}

/// Column names of a table together with their primary index membership.
pub fn primary_index_columns(table: &str) -> String {
    format!(
        "SELECT column_name, is_in_primary_index FROM information_schema.columns \
         WHERE table_name = {} ORDER BY ordinal_position",
        string_literal(table.rsplit('.').next().unwrap_or(table)),
    )
}
