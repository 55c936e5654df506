use async_trait::async_trait;
use medication_service::config::MedicationConfig;
use medication_service::models::Medication;
use medication_service::services::{InMemoryMedicationStore, MedicationStore};
use medication_service::Application;
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// In-memory store that counts how often it is closed.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryMedicationStore,
    closes: AtomicUsize,
}

#[async_trait]
impl MedicationStore for CountingStore {
    async fn list(&self) -> Result<Vec<Medication>, AppError> {
        self.inner.list().await
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Medication>, AppError> {
        self.inner.get(id).await
    }

    async fn create(&self, medication: Medication) -> Result<Medication, AppError> {
        self.inner.create(medication).await
    }

    async fn replace(
        &self,
        id: ObjectId,
        medication: Medication,
    ) -> Result<Option<Medication>, AppError> {
        self.inner.replace(id, medication).await
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn serves_over_tcp_and_closes_store_once_on_shutdown() {
    let mut config = MedicationConfig::in_memory();
    config.common.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.common.port = 0; // Random port for testing

    let store = Arc::new(CountingStore::default());
    let app = Application::build_with_store(config, store.clone())
        .await
        .expect("Failed to build test application");
    let address = format!("http://127.0.0.1:{}", app.port());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(app.run_with_shutdown(async {
        stop_rx.await.ok();
    }));

    let client = reqwest::Client::new();
    let created: serde_json::Value = client
        .post(format!("{}/medications", address))
        .json(&serde_json::json!({ "name": "Aspirin", "price": 4.5 }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(created["name"], "Aspirin");

    let listed: Vec<serde_json::Value> = client
        .get(format!("{}/medications", address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(listed.len(), 1);

    drop(client);
    stop_tx.send(()).expect("Server already stopped");
    server
        .await
        .expect("Server task panicked")
        .expect("Server returned an error");

    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_bind_closes_store() {
    let occupied = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind placeholder listener");

    let mut config = MedicationConfig::in_memory();
    config.common.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.common.port = occupied.local_addr().unwrap().port();

    let store = Arc::new(CountingStore::default());
    match Application::build_with_store(config, store.clone()).await {
        Err(AppError::InternalError(_)) => {}
        Err(other) => panic!("expected a bind error, got {:?}", other),
        Ok(_) => panic!("bound a port that is already in use"),
    }

    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mongo_backend_requires_settings() {
    let mut config = MedicationConfig::in_memory();
    config.store = medication_service::config::StoreBackend::MongoDb;

    match Application::build(config).await {
        Err(AppError::ConfigError(_)) => {}
        Err(other) => panic!("expected ConfigError, got {:?}", other),
        Ok(_) => panic!("expected ConfigError, got a running application"),
    }
}
