use crate::config::{MedicationConfig, StoreBackend};
use crate::handlers;
use crate::services::{InMemoryMedicationStore, MedicationStore, MongoDb, MongoMedicationStore};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{
    cors_middleware, metrics_middleware, request_id_middleware, REQUEST_ID_HEADER,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: MedicationConfig,
    pub store: Arc<dyn MedicationStore>,
}

impl AppState {
    pub fn new(config: MedicationConfig, store: Arc<dyn MedicationStore>) -> Self {
        Self { config, store }
    }
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route(
            "/medications",
            get(handlers::list_medications).post(handlers::create_medication),
        )
        .route(
            "/medications/:id",
            get(handlers::get_medication)
                .put(handlers::update_medication)
                .delete(handlers::delete_medication),
        )
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware));

    let router = if state.config.cors.enabled {
        router.layer(from_fn(cors_middleware))
    } else {
        router
    };

    router.with_state(state)
}

/// Open the store selected by `config`.
pub async fn connect_store(
    config: &MedicationConfig,
) -> Result<Arc<dyn MedicationStore>, AppError> {
    match config.store {
        StoreBackend::MongoDb => {
            let mongo = config.mongodb.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("MongoDB settings are missing"))
            })?;
            let db = MongoDb::connect(mongo, config.timeouts.connect()).await?;
            Ok(Arc::new(MongoMedicationStore::new(db)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory medication store; records are not persisted");
            Ok(Arc::new(InMemoryMedicationStore::new()))
        }
    }
}

pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: MedicationConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    /// Bind the listener around an already opened `store`. The store is
    /// closed if binding fails.
    pub async fn build_with_store(
        config: MedicationConfig,
        store: Arc<dyn MedicationStore>,
    ) -> Result<Self, AppError> {
        let addr = config.common.socket_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
                store.close().await;
                return Err(AppError::from(e));
            }
        };

        let state = AppState::new(config, store);
        let router = build_router(state.clone());

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.local_addr().map(|addr| addr.port()).unwrap_or_default()
    }

    pub fn store(&self) -> Arc<dyn MedicationStore> {
        self.state.store.clone()
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        self.run_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, let in-flight requests drain, then close
    /// the store.
    pub async fn run_with_shutdown<F>(self, signal: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(address = ?self.listener.local_addr().ok(), "Listening");

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        self.state.store.close().await;

        served.map_err(AppError::from)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
