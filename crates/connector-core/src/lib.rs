//! Plugin contract shared by the Firebolt connectors.
//!
//! A host runtime drives connectors through a fixed lifecycle:
//! `configure` → `open` → `read`/`write` (+ `ack` for sources) → `teardown`.
//! This crate holds the types that cross that boundary:
//!
//! - [`Value`] / [`Row`] - dynamically typed column values
//! - [`Record`], [`Data`], [`Metadata`], [`Operation`] - the unit of transfer
//! - [`Position`] - opaque resume token handed back and forth with the host
//! - [`Source`] / [`Destination`] - the lifecycle traits
//! - [`config`] - helpers for parsing string-keyed configuration maps
//!
//! # Architecture
//!
//! ```text
//! connector-core (this crate)
//!    │
//!    ├─── firebolt-client       (rows are decoded into Value)
//!    ├─── firebolt-repository   (SQL literals rendered from Value)
//!    ├─── firebolt-source       (implements Source)
//!    └─── firebolt-destination  (implements Destination)
//! ```

pub mod config;
pub mod plugin;
pub mod record;
pub mod value;

pub use config::{ConfigError, Parameter};
pub use plugin::{Destination, Source};
pub use record::{Data, Metadata, Operation, Position, Record};
pub use value::{Row, Value};

// Cancellation is part of every blocking lifecycle call.
pub use tokio_util::sync::CancellationToken;
