//! In-memory table used by the unit tests.

use async_trait::async_trait;
use connector_core::{Row, Value};
use firebolt_repository::{Result, TableReader};
use std::ops::Range;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub(crate) struct FakeTable {
    rows: Mutex<Vec<Row>>,
    primary_index: Mutex<Option<Vec<String>>>,
    offsets: Mutex<Vec<u64>>,
    close_calls: Mutex<u32>,
    cancelled: Mutex<bool>,
}

impl FakeTable {
    pub(crate) fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    /// Rows `{id: i, name: "row-i"}` for `i` in `0..n`.
    pub(crate) fn with_ids(n: u64) -> Self {
        let table = Self::default();
        table.append_ids(0..n as i64);
        table
    }

    pub(crate) fn append_ids(&self, ids: Range<i64>) {
        let mut rows = self.rows.lock().unwrap();
        for id in ids {
            let mut row = Row::new();
            row.insert("id".to_string(), Value::Int(id));
            row.insert("name".to_string(), Value::from(format!("row-{id}")));
            rows.push(row);
        }
    }

    /// `None` makes the primary index lookup fail.
    pub(crate) fn set_primary_index(&self, columns: Option<Vec<String>>) {
        *self.primary_index.lock().unwrap() = columns;
    }

    pub(crate) fn fail_with_cancel(&self) {
        *self.cancelled.lock().unwrap() = true;
    }

    pub(crate) fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
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
impl TableReader for FakeTable {
    async fn get_rows(
        &self,
        _cancel: &CancellationToken,
        _table: &str,
        _ordering_columns: &[String],
        columns: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>> {
        self.check_cancelled()?;
        self.offsets.lock().unwrap().push(offset);

        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|row| {
                if columns.is_empty() {
                    row.clone()
                } else {
                    row.iter()
                        .filter(|(name, _)| columns.contains(name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                }
            })
            .collect())
    }

    async fn primary_index_columns(
        &self,
        _cancel: &CancellationToken,
        _table: &str,
    ) -> Result<Vec<String>> {
        self.check_cancelled()?;
        self.primary_index
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                firebolt_client::Error::InvalidStatus {
                    status: 400,
                    body: "information_schema is not available".to_string(),
                }
                .into()
            })
    }

    async fn close(&self) {
        *self.close_calls.lock().unwrap() += 1;
    }
}
