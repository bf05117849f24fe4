//! Source connection management for MongoDB
//!
//! This module provides:
//! - The [`SourceConnector`] seam used by the pipeline
//! - [`MongoSource`], the MongoDB driver implementation
//!
//! A connection is established once per run, used for a single full
//! collection read, and released on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::{Client, options::ClientOptions};
use tracing::debug;

use crate::config::Config;
use crate::error::mongo::wrap_driver_error;
use crate::error::{ErrorKind, Result};
use crate::model::RecordBatch;

/// Timeouts bounding a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimeouts {
    /// How long the driver may search for a usable server
    pub server_selection: Duration,

    /// TCP connect timeout
    pub connect: Duration,
}

impl Default for ConnectTimeouts {
    fn default() -> Self {
        Self {
            server_selection: Duration::from_secs(5),
            connect: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for ConnectTimeouts {
    fn from(config: &Config) -> Self {
        Self {
            server_selection: config.server_selection_timeout(),
            connect: config.connect_timeout(),
        }
    }
}

/// Access to the document store
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Live connection handle
    type Connection: Send + Sync;

    /// Establish a connection
    ///
    /// # Arguments
    /// * `connection_string` - Source connection URI
    /// * `timeouts` - Per-attempt timeouts
    ///
    /// # Returns
    /// * `Result<Self::Connection>` - Live handle, or a `Connectivity` error
    async fn connect(
        &self,
        connection_string: &str,
        timeouts: &ConnectTimeouts,
    ) -> Result<Self::Connection>;

    /// Fetch every document of a collection
    ///
    /// No filter, projection or pagination is applied. An empty collection
    /// is a `NoData` error.
    async fn fetch_all(
        &self,
        connection: &Self::Connection,
        database: &str,
        collection: &str,
    ) -> Result<RecordBatch>;

    /// Release a connection
    async fn disconnect(&self, connection: Self::Connection) -> Result<()>;
}

/// MongoDB driver implementation of [`SourceConnector`]
#[derive(Debug, Clone)]
pub struct MongoSource {
    /// Application name reported to the server
    app_name: String,
}

impl MongoSource {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Parse connection URI and apply timeouts
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `timeouts` - Connect timeouts
    ///
    /// # Returns
    /// * `Result<ClientOptions>` - Configured options or error
    async fn client_options(&self, uri: &str, timeouts: &ConnectTimeouts) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            wrap_driver_error(ErrorKind::Connectivity, "Invalid connection string", e)
        })?;

        options.server_selection_timeout = Some(timeouts.server_selection);
        options.connect_timeout = Some(timeouts.connect);
        options.app_name = Some(self.app_name.clone());

        Ok(options)
    }
}

impl Default for MongoSource {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

#[async_trait]
impl SourceConnector for MongoSource {
    type Connection = Client;

    async fn connect(&self, connection_string: &str, timeouts: &ConnectTimeouts) -> Result<Client> {
        let options = self.client_options(connection_string, timeouts).await?;
        let client = Client::with_options(options).map_err(|e| {
            wrap_driver_error(ErrorKind::Connectivity, "Failed to create client", e)
        })?;

        // The driver connects lazily; a ping forces server selection now
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| wrap_driver_error(ErrorKind::Connectivity, "Ping failed", e))?;

        debug!("MongoDB connection verified");
        Ok(client)
    }

    async fn fetch_all(
        &self,
        connection: &Client,
        database: &str,
        collection: &str,
    ) -> Result<RecordBatch> {
        let coll = connection.database(database).collection::<Document>(collection);

        let cursor = coll.find(doc! {}).await.map_err(|e| {
            wrap_driver_error(ErrorKind::Transport, "Find query failed", e)
        })?;
        let records: Vec<Document> = cursor.try_collect().await.map_err(|e| {
            wrap_driver_error(ErrorKind::Transport, "Cursor iteration failed", e)
        })?;

        debug!(
            "Fetched {} documents from {}.{}",
            records.len(),
            database,
            collection
        );

        RecordBatch::new(records, collection)
    }

    async fn disconnect(&self, connection: Client) -> Result<()> {
        connection.shutdown().await;
        debug!("MongoDB client shut down");
        Ok(())
    }
}
