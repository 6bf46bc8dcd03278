//! Firebolt destination.
//!
//! Every record becomes one `INSERT` into the configured table, or into the
//! table named by the record's `firebolt.table` metadata. Field names are
//! lower-cased, nested values are stored as JSON text and values bound for
//! `DATE`/`TIMESTAMP` columns are parsed and reformatted first. The service
//! only supports inserts; the record operation is not inspected.

pub mod config;
pub mod destination;
pub mod error;
pub mod layouts;
pub mod writer;

#[cfg(test)]
mod testing;

pub use config::DestinationConfig;
pub use destination::{FireboltDestination, DEFAULT_ENGINE_START_TIMEOUT};
pub use error::{Error, Result};
pub use layouts::{parse_time, DATE_FORMAT, TIMESTAMP_FORMAT};
pub use writer::{Writer, METADATA_TABLE};
