#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use medication_service::config::MedicationConfig;
use medication_service::services::{InMemoryMedicationStore, MedicationStore};
use medication_service::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn error(&self) -> String {
        self.json()["error"]
            .as_str()
            .expect("Missing error message")
            .to_string()
    }
}

pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(MedicationConfig::in_memory(), Arc::new(InMemoryMedicationStore::new()))
    }

    pub fn with_store(store: Arc<dyn MedicationStore>) -> Self {
        Self::with_config(MedicationConfig::in_memory(), store)
    }

    pub fn with_config(config: MedicationConfig, store: Arc<dyn MedicationStore>) -> Self {
        let router = build_router(AppState::new(config, store));
        TestApp { router }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// POST a medication and return the created record.
    pub async fn create(&self, body: Value) -> Value {
        let response = self.request(Method::POST, "/medications", Some(body)).await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()
    }
}

pub fn aspirin() -> Value {
    serde_json::json!({
        "name": "Aspirin",
        "description": "Pain relief",
        "price": 4.5,
        "imageUrl": "http://x/a.png"
    })
}
