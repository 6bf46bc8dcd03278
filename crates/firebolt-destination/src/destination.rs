use async_trait::async_trait;
use connector_core::{CancellationToken, Destination, Parameter, Record};
use firebolt_client::{Client, ClientOptions};
use firebolt_repository::{Repository, TableWriter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DestinationConfig;
use crate::error::{Error, Result};
use crate::writer::Writer;

/// Upper bound for an engine cold start during `open`.
pub const DEFAULT_ENGINE_START_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Destination inserting every record as a row of a Firebolt table.
pub struct FireboltDestination {
    options: ClientOptions,
    engine_start_timeout: Duration,
    config: Option<DestinationConfig>,
    writer: Option<Writer>,
}

impl Default for FireboltDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl FireboltDestination {
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default(), DEFAULT_ENGINE_START_TIMEOUT)
    }

    pub fn with_options(options: ClientOptions, engine_start_timeout: Duration) -> Self {
        Self {
            options,
            engine_start_timeout,
            config: None,
            writer: None,
        }
    }

    pub fn config(&self) -> Option<&DestinationConfig> {
        self.config.as_ref()
    }

    async fn connect(
        &self,
        cancel: &CancellationToken,
        config: &DestinationConfig,
    ) -> Result<Arc<Client>> {
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

    /// Prepare the writer over an already connected table writer.
    pub async fn open_with_writer(
        &mut self,
        cancel: &CancellationToken,
        table_writer: Arc<dyn TableWriter>,
    ) -> Result<()> {
        let table = self.config.as_ref().ok_or(Error::NotConfigured)?.table();

        let mut writer = Writer::new(table_writer, table.clone());
        let loaded = writer
            .load_column_types(cancel, &table)
            .await
            .map(|types| types.len());
        let columns = match loaded {
            Ok(columns) => columns,
            Err(e) => {
                writer.close().await;
                return Err(e);
            }
        };

        info!(table = %table, columns, "Opened Firebolt destination");
        self.writer = Some(writer);
        Ok(())
    }
}

#[async_trait]
impl Destination for FireboltDestination {
    type Error = Error;

    fn parameters(&self) -> Vec<Parameter> {
        DestinationConfig::parameters()
    }

    fn configure(&mut self, config: &HashMap<String, String>) -> Result<()> {
        self.config = Some(DestinationConfig::from_map(config)?);
        Ok(())
    }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<()> {
        let config = self.config.clone().ok_or(Error::NotConfigured)?;
        let client = self.connect(cancel, &config).await?;
        let table_writer: Arc<dyn TableWriter> = Arc::new(Repository::new(client));
        self.open_with_writer(cancel, table_writer).await
    }

    async fn write(&mut self, cancel: &CancellationToken, record: &Record) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::NotOpened)?;
        writer.insert_record(cancel, record).await
    }

    async fn teardown(&mut self, _cancel: &CancellationToken) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close().await;
            info!("Closed Firebolt destination");
        }
        Ok(())
    }
}
