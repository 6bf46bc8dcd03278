use async_trait::async_trait;
use connector_core::{Row, Value};
use firebolt_client::{Client, QueryResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::sql;

/// Executes SQL text. Implemented by [`Client`]; tests substitute fakes.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> firebolt_client::Result<QueryResponse>;

    async fn close(&self);
}

#[async_trait]
impl QueryRunner for Client {
    async fn run_query(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> firebolt_client::Result<QueryResponse> {
        Client::run_query(self, cancel, query).await
    }

    async fn close(&self) {
        Client::close(self).await
    }
}

/// Read side used by the snapshot iterator.
#[async_trait]
pub trait TableReader: Send + Sync {
    /// One page of rows ordered by `ordering_columns`.
    async fn get_rows(
        &self,
        cancel: &CancellationToken,
        table: &str,
        ordering_columns: &[String],
        columns: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>>;

    /// Columns of the table's primary index, in declaration order.
    async fn primary_index_columns(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<Vec<String>>;

    async fn close(&self);
}

/// Write side used by the destination writer.
#[async_trait]
pub trait TableWriter: Send + Sync {
    async fn insert_row(
        &self,
        cancel: &CancellationToken,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<()>;

    /// Lower-cased column name → column type.
    async fn get_column_types(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<HashMap<String, String>>;

    async fn close(&self);
}

/// Table access on top of a [`QueryRunner`].
pub struct Repository<R: QueryRunner + ?Sized> {
    runner: Arc<R>,
}

impl<R: QueryRunner + ?Sized> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
        }
    }
}

impl<R: QueryRunner + ?Sized> Repository<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    async fn run(&self, cancel: &CancellationToken, query: &str) -> Result<QueryResponse> {
        debug!(query, "Running query");
        Ok(self
            .runner
            .run_query(cancel, query)
            .await
            .map_err(|e| e.context("run query"))?)
    }
}

#[async_trait]
impl<R: QueryRunner + ?Sized> TableReader for Repository<R> {
    async fn get_rows(
        &self,
        cancel: &CancellationToken,
        table: &str,
        ordering_columns: &[String],
        columns: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>> {
        let query = sql::select_page(table, ordering_columns, columns, limit, offset)?;
        Ok(self.run(cancel, &query).await?.data)
    }

    async fn primary_index_columns(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<Vec<String>> {
        let response = self.run(cancel, &sql::primary_index_columns(table)).await?;

        let columns = response
            .data
            .iter()
            .filter(|row| row.get("is_in_primary_index").is_some_and(is_truthy))
            .filter_map(|row| row.get("column_name").and_then(Value::as_str))
            .map(str::to_lowercase)
            .collect::<Vec<_>>();

        if columns.is_empty() && !response.data.is_empty() {
            warn!(table, "Table has no primary index columns");
        }
        Ok(columns)
    }

    async fn close(&self) {
        self.runner.close().await
    }
}

#[async_trait]
impl<R: QueryRunner + ?Sized> TableWriter for Repository<R> {
    async fn insert_row(
        &self,
        cancel: &CancellationToken,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<()> {
        let query = sql::insert_row(table, columns, values)?;
        self.run(cancel, &query).await?;
        Ok(())
    }

    async fn get_column_types(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<HashMap<String, String>> {
        let response = self.run(cancel, &sql::describe(table)).await?;

        Ok(response
            .data
            .iter()
            .filter_map(|row| {
                let name = row.get("column_name").and_then(Value::as_str)?;
                let data_type = row.get("data_type").and_then(Value::as_str)?;
                Some((name.to_lowercase(), data_type.to_string()))
            })
            .collect())
    }

    async fn close(&self) {
        self.runner.close().await
    }
}

/// Primary index membership is reported as a boolean, a number or YES/NO
/// depending on the service version.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "yes" | "true" | "1"),
        other => other.as_f64().is_some_and(|n| n != 0.0),
    }
}
