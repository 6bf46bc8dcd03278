//! Query response normalisation.
//!
//! Firebolt reports booleans as `UInt8` and dates/timestamps as strings.
//! Rows are rewritten here so that callers see lower-cased column names,
//! real booleans and real timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use connector_core::{Row, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::QueryResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Bool,
    Date,
    Timestamp,
}

/// Strip `Nullable(..)` and type parameters, lower-case the rest.
pub fn base_type(column_type: &str) -> String {
    let mut t = column_type.trim().to_lowercase();
    if let Some(inner) = t.strip_prefix("nullable(").and_then(|s| s.strip_suffix(')')) {
        t = inner.to_string();
    }
    if let Some(idx) = t.find('(') {
        t.truncate(idx);
    }
    t.trim_end_matches(" null").trim().to_string()
}

fn conversion_for(column_type: &str) -> Option<Conversion> {
    match base_type(column_type).as_str() {
        "uint8" | "boolean" | "bool" => Some(Conversion::Bool),
        "date" | "pgdate" | "date_ext" => Some(Conversion::Date),
        "datetime" | "datetime64" | "timestamp" | "timestampntz" | "timestamptz"
        | "timestamp_ext" => Some(Conversion::Timestamp),
        _ => None,
    }
}

pub(crate) fn normalize(response: &mut QueryResponse) -> Result<()> {
    let conversions: HashMap<String, Conversion> = response
        .meta
        .iter()
        .filter_map(|meta| {
            conversion_for(&meta.column_type).map(|c| (meta.name.to_lowercase(), c))
        })
        .collect();

    for row in response.data.iter_mut() {
        let original = std::mem::take(row);
        *row = normalize_row(original, &conversions)?;
    }

    Ok(())
}

fn normalize_row(row: Row, conversions: &HashMap<String, Conversion>) -> Result<Row> {
    let mut normalized = Row::new();
    for (name, value) in row {
        let name = name.to_lowercase();
        let value = match conversions.get(&name) {
            Some(conversion) if !value.is_null() => convert(&name, value, *conversion)?,
            _ => value,
        };
        normalized.insert(name, value);
    }
    Ok(normalized)
}

fn convert(column: &str, value: Value, conversion: Conversion) -> Result<Value> {
    match conversion {
        Conversion::Bool => match value {
            Value::Bool(_) => Ok(value),
            other => other
                .as_f64()
                .map(|n| Value::Bool(n != 0.0))
                .ok_or_else(|| Error::Normalize {
                    column: column.to_string(),
                    reason: format!("cannot cast {other:?} to a number"),
                }),
        },
        Conversion::Date => Ok(match value.as_str().and_then(parse_date) {
            Some(ts) => Value::Timestamp(ts),
            None => {
                debug!(column, "Leaving unrecognised date value as is");
                value
            }
        }),
        Conversion::Timestamp => Ok(match value.as_str().and_then(parse_timestamp) {
            Some(ts) => Value::Timestamp(ts),
            None => {
                debug!(column, "Leaving unrecognised timestamp value as is");
                value
            }
        }),
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .or_else(|| parse_timestamp(raw))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}
