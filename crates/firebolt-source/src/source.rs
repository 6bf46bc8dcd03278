use async_trait::async_trait;
use connector_core::{CancellationToken, ConfigError, Parameter, Position, Record, Source};
use firebolt_client::{Client, ClientOptions};
use firebolt_repository::{Repository, TableReader};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{SourceConfig, KEY_COLUMNS};
use crate::error::{Error, Result};
use crate::iterator::{IteratorConfig, SnapshotIterator};
use crate::keys::resolve_key_columns;

/// Upper bound for an engine cold start during `open`.
pub const DEFAULT_ENGINE_START_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Snapshot source reading one Firebolt table.
pub struct FireboltSource {
    options: ClientOptions,
    engine_start_timeout: Duration,
    config: Option<SourceConfig>,
    iterator: Option<SnapshotIterator>,
}

impl Default for FireboltSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FireboltSource {
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default(), DEFAULT_ENGINE_START_TIMEOUT)
    }

    pub fn with_options(options: ClientOptions, engine_start_timeout: Duration) -> Self {
        Self {
            options,
            engine_start_timeout,
            config: None,
            iterator: None,
        }
    }

    pub fn config(&self) -> Option<&SourceConfig> {
        self.config.as_ref()
    }

    async fn connect(&self, cancel: &CancellationToken, config: &SourceConfig) -> Result<Arc<Client>> {
        let client = Arc::new(Client::with_options(
            config.connection.database.clone(),
            self.options.clone(),
        )?);

        let ready: firebolt_client::Result<()> = async {
            client
                .login(cancel, &config.connection.login_params())
                .await
                .map_err(|e| e.context("client login"))?;
            client
                .ensure_engine_running(cancel, self.engine_start_timeout)
                .await
        }
        .await;

        if let Err(e) = ready {
            client.close().await;
            return Err(e.into());
        }
        Ok(client)
    }

    /// Position the snapshot over an already connected reader.
    pub async fn open_with_reader(
        &mut self,
        cancel: &CancellationToken,
        reader: Arc<dyn TableReader>,
        position: Option<&Position>,
    ) -> Result<()> {
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;
        let table = config.connection.table.clone();

        let (key_columns, key_source) = resolve_key_columns(
            reader.as_ref(),
            cancel,
            &table,
            &config.primary_keys,
            &config.ordering_columns,
        )
        .await?;

        // keys found through the table must be readable through the projection
        if !config.columns.is_empty() {
            if let Some(column) = key_columns.iter().find(|k| !config.columns.contains(k)) {
                reader.close().await;
                return Err(ConfigError::Invalid {
                    key: KEY_COLUMNS,
                    reason: format!(
                        "key column {column:?} ({key_source:?}) is not one of the selected columns"
                    ),
                }
                .into());
            }
        }

        let mut iterator = SnapshotIterator::new(
            reader,
            IteratorConfig {
                table: table.clone(),
                columns: config.columns.clone(),
                key_columns: key_columns.clone(),
                ordering_columns: config.ordering_columns.clone(),
                batch_size: config.batch_size,
            },
        );

        if let Err(e) = iterator.setup(cancel, position).await {
            iterator.stop().await;
            return Err(e);
        }

        info!(
            table = %table,
            key_columns = ?key_columns,
            key_source = ?key_source,
            batch_size = config.batch_size,
            "Opened Firebolt source"
        );
        self.iterator = Some(iterator);
        Ok(())
    }
}

#[async_trait]
impl Source for FireboltSource {
    type Error = Error;

    fn parameters(&self) -> Vec<Parameter> {
        SourceConfig::parameters()
    }

    fn configure(&mut self, config: &HashMap<String, String>) -> Result<()> {
        self.config = Some(SourceConfig::from_map(config)?);
        Ok(())
    }

    async fn open(&mut self, cancel: &CancellationToken, position: Option<&Position>) -> Result<()> {
        let config = self.config.clone().ok_or(Error::NotConfigured)?;
        let client = self.connect(cancel, &config).await?;
        let reader: Arc<dyn TableReader> = Arc::new(Repository::new(client));
        self.open_with_reader(cancel, reader, position).await
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Result<Option<Record>> {
        let iterator = self.iterator.as_mut().ok_or(Error::NotOpened)?;

        if !iterator.has_next(cancel).await? {
            return Ok(None);
        }
        iterator.next().map(Some)
    }

    async fn ack(&mut self, _cancel: &CancellationToken, position: &Position) -> Result<()> {
        let iterator = self.iterator.as_ref().ok_or(Error::NotOpened)?;
        iterator.ack(position);
        Ok(())
    }

    async fn teardown(&mut self, _cancel: &CancellationToken) -> Result<()> {
        if let Some(mut iterator) = self.iterator.take() {
            iterator.stop().await;
            info!("Closed Firebolt source");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTable;
    use connector_core::{Data, Row, Value};

    fn config_map(extra: &[(&str, &str)]) -> HashMap<String, String> {
        [
            ("email", "test@test.com"),
            ("password", "12345"),
            ("accountName", "acc"),
            ("engineName", "eng"),
            ("db", "db"),
            ("table", "T"),
            ("orderingColumns", "id"),
        ]
        .iter()
        .chain(extra.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn text_table() -> Arc<FakeTable> {
        let rows = [("1", "foo"), ("2", "bar"), ("3", "test")]
            .into_iter()
            .map(|(id, name)| {
                let mut row = Row::new();
                row.insert("id".to_string(), Value::from(id));
                row.insert("name".to_string(), Value::from(name));
                row
            })
            .collect();
        Arc::new(FakeTable::with_rows(rows))
    }

    fn key_of(record: &Record) -> Row {
        match &record.key {
            Data::Structured(row) => row.clone(),
            other => panic!("unexpected key {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resume_after_teardown() {
        let cancel = CancellationToken::new();
        let table = text_table();

        let mut source = FireboltSource::new();
        source
            .configure(&config_map(&[("batchSize", "2")]))
            .unwrap();
        source
            .open_with_reader(&cancel, table.clone(), None)
            .await
            .unwrap();

        let first = source.read(&cancel).await.unwrap().unwrap();
        assert_eq!(key_of(&first)["id"], Value::from("1"));
        source.ack(&cancel, &first.position).await.unwrap();
        source.teardown(&cancel).await.unwrap();

        let mut source = FireboltSource::new();
        source
            .configure(&config_map(&[("batchSize", "2")]))
            .unwrap();
        source
            .open_with_reader(&cancel, table, Some(&first.position))
            .await
            .unwrap();

        let second = source.read(&cancel).await.unwrap().unwrap();
        assert_eq!(key_of(&second)["id"], Value::from("2"));
    }

    #[tokio::test]
    async fn test_read_backs_off_at_end_of_table() {
        let cancel = CancellationToken::new();
        let mut source = FireboltSource::new();
        source.configure(&config_map(&[])).unwrap();
        source
            .open_with_reader(&cancel, text_table(), None)
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(source.read(&cancel).await.unwrap().is_some());
        }
        assert!(source.read(&cancel).await.unwrap().is_none());
        assert!(source.read(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_configured_primary_keys_are_used() {
        let cancel = CancellationToken::new();
        let mut source = FireboltSource::new();
        source
            .configure(&config_map(&[("primaryKeys", "name")]))
            .unwrap();
        source
            .open_with_reader(&cancel, text_table(), None)
            .await
            .unwrap();

        let record = source.read(&cancel).await.unwrap().unwrap();
        let key = key_of(&record);
        assert_eq!(key.len(), 1);
        assert_eq!(key["name"], Value::from("foo"));
    }

    #[tokio::test]
    async fn test_ordering_key_outside_columns_is_rejected() {
        let cancel = CancellationToken::new();
        let table = text_table();
        let mut source = FireboltSource::new();
        source.configure(&config_map(&[("columns", "name")])).unwrap();

        let err = source
            .open_with_reader(&cancel, table.clone(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Invalid { key: KEY_COLUMNS, .. })
        ));
        assert!(table.offsets().is_empty());
        assert_eq!(table.close_calls(), 1);
        assert!(matches!(source.read(&cancel).await, Err(Error::NotOpened)));
    }

    #[tokio::test]
    async fn test_primary_index_outside_columns_is_rejected() {
        let cancel = CancellationToken::new();
        let table = text_table();
        table.set_primary_index(Some(vec!["id".to_string()]));
        let mut source = FireboltSource::new();
        source
            .configure(&config_map(&[("columns", "name"), ("orderingColumns", "name")]))
            .unwrap();

        let err = source
            .open_with_reader(&cancel, table.clone(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Invalid { key: KEY_COLUMNS, .. })
        ));
        assert!(table.offsets().is_empty());
        assert_eq!(table.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_selected_columns_with_key_read_fine() {
        let cancel = CancellationToken::new();
        let mut source = FireboltSource::new();
        source
            .configure(&config_map(&[("columns", "id, name")]))
            .unwrap();
        source
            .open_with_reader(&cancel, text_table(), None)
            .await
            .unwrap();

        let record = source.read(&cancel).await.unwrap().unwrap();
        assert_eq!(key_of(&record)["id"], Value::from("1"));
    }

    #[tokio::test]
    async fn test_lifecycle_order_is_enforced() {
        let cancel = CancellationToken::new();
        let mut source = FireboltSource::new();

        assert!(matches!(
            source.open_with_reader(&cancel, text_table(), None).await,
            Err(Error::NotConfigured)
        ));
        assert!(matches!(source.read(&cancel).await, Err(Error::NotOpened)));
        assert!(matches!(
            source.ack(&cancel, &Position::default()).await,
            Err(Error::NotOpened)
        ));
        // teardown without open is fine
        source.teardown(&cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_closes_reader() {
        let cancel = CancellationToken::new();
        let table = text_table();
        let mut source = FireboltSource::new();
        source.configure(&config_map(&[])).unwrap();
        source
            .open_with_reader(&cancel, table.clone(), None)
            .await
            .unwrap();

        source.teardown(&cancel).await.unwrap();
        source.teardown(&cancel).await.unwrap();
        assert_eq!(table.close_calls(), 1);
    }

    #[test]
    fn test_parameters() {
        let params = FireboltSource::new().parameters();
        let ordering = params
            .iter()
            .find(|p| p.name == "orderingColumns")
            .unwrap();
        assert!(ordering.required);
        let batch = params.iter().find(|p| p.name == "batchSize").unwrap();
        assert_eq!(batch.default, "100");
    }
}
