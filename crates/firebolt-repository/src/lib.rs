//! Table access for the Firebolt connectors.
//!
//! [`Repository`] turns structured requests (a page of a table, a row to
//! insert, the column types of a table) into SQL text and runs it through a
//! [`QueryRunner`], normally the API client. The source and the destination
//! only see the [`TableReader`] and [`TableWriter`] seams.

pub mod error;
pub mod repository;
pub mod sql;

pub use error::{Error, Result};
pub use repository::{QueryRunner, Repository, TableReader, TableWriter};
