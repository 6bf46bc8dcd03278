//! In-memory table writer used by the unit tests.

use async_trait::async_trait;
use connector_core::{Row, Value};
use firebolt_repository::{Error, Result, TableWriter};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub(crate) struct FakeWriter {
    column_types: Mutex<HashMap<String, HashMap<String, String>>>,
    inserts: Mutex<Vec<(String, Row)>>,
    describe_calls: Mutex<u32>,
    close_calls: Mutex<u32>,
    cancelled: Mutex<bool>,
}

impl FakeWriter {
    pub(crate) fn set_column_types(&self, table: &str, types: &[(&str, &str)]) {
        self.column_types.lock().unwrap().insert(
            table.to_string(),
            types
                .iter()
                .map(|(name, t)| (name.to_string(), t.to_string()))
                .collect(),
        );
    }

    pub(crate) fn fail_with_cancel(&self) {
        *self.cancelled.lock().unwrap() = true;
    }

    pub(crate) fn inserts(&self) -> Vec<(String, Row)> {
        self.inserts.lock().unwrap().clone()
    }

    pub(crate) fn describe_calls(&self) -> u32 {
        *self.describe_calls.lock().unwrap()
    }

    pub(crate) fn close_calls(&self) -> u32 {
        *self.close_calls.lock().unwrap()
    }

    fn check_cancelled(&self) -> Result<()> {
        if *self.cancelled.lock().unwrap() {
            return Err(firebolt_client::Error::Cancelled.into());
        }
        Ok(())
    }
}

#[async_trait]
impl TableWriter for FakeWriter {
    async fn insert_row(
        &self,
        _cancel: &CancellationToken,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<()> {
        self.check_cancelled()?;
        if columns.len() != values.len() {
            return Err(Error::ColumnValueMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }
        let row = columns.iter().cloned().zip(values.iter().cloned()).collect();
        self.inserts.lock().unwrap().push((table.to_string(), row));
        Ok(())
    }

    async fn get_column_types(
        &self,
        _cancel: &CancellationToken,
        table: &str,
    ) -> Result<HashMap<String, String>> {
        self.check_cancelled()?;
        *self.describe_calls.lock().unwrap() += 1;
        Ok(self
            .column_types
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(&self) {
        *self.close_calls.lock().unwrap() += 1;
    }
}
