use crate::config::MongoConfig;
use crate::models::Medication;
use mongodb::{bson::doc, options::ClientOptions, Client as MongoClient, Collection};
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One client connection to the medications collection.
///
/// Cloning shares the driver's connection pool.
#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    collection: Collection<Medication>,
    timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl MongoDb {
    /// Connect and verify the server answers a `ping` within `timeout`.
    pub async fn connect(config: &MongoConfig, timeout: Duration) -> Result<Self, AppError> {
        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            "Connecting to MongoDB"
        );

        let mut client_options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB URI: {}", e);
            AppError::ConnectionError(anyhow::anyhow!("Invalid MongoDB URI: {}", e))
        })?;
        client_options.app_name = Some("medication-service".to_string());
        client_options.connect_timeout = Some(timeout);
        client_options.server_selection_timeout = Some(timeout);

        let client = MongoClient::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::ConnectionError(anyhow::Error::new(e))
        })?;

        // The driver connects lazily; force the handshake so startup fails fast.
        let admin = client.database("admin");
        let ping = admin.run_command(doc! { "ping": 1 }, None);
        match tokio::time::timeout(timeout, ping).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                return Err(AppError::ConnectionError(anyhow::Error::new(e)));
            }
            Err(_) => {
                tracing::error!(timeout_secs = timeout.as_secs(), "MongoDB handshake timed out");
                return Err(AppError::ConnectionError(anyhow::anyhow!(
                    "MongoDB handshake timed out after {:?}",
                    timeout
                )));
            }
        }

        let collection = client
            .database(&config.database)
            .collection::<Medication>(&config.collection);

        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");

        Ok(Self {
            client,
            collection,
            timeout,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn medications(&self) -> &Collection<Medication> {
        &self.collection
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    /// Release the connection pool. Only the first call on any clone does
    /// work; failure is logged, never returned.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        match tokio::time::timeout(self.timeout, self.client.clone().shutdown()).await {
            Ok(()) => tracing::info!("Disconnected from MongoDB"),
            Err(_) => tracing::warn!(
                timeout_secs = self.timeout.as_secs(),
                "Error disconnecting from MongoDB: shutdown timed out"
            ),
        }
    }
}
