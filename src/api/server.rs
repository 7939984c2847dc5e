//! HTTP server for the scanner REST API

use crate::api::handlers::{self, ApiState};
use crate::error::{AppError, Result};
use crate::scheduler::RefreshHandle;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// API server manager
pub struct ApiServer {
    state: Arc<ApiState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Build the router with all routes and layers
pub fn router(state: Arc<ApiState>) -> Router {
    // Presentation layers poll from anywhere on the local machine
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))
        // Scanner matrix
        .route("/api/v1/matrix", get(handlers::get_matrix))
        .route("/api/v1/refresh", post(handlers::refresh))
        // Store and ingest
        .route("/api/v1/counts", get(handlers::get_counts))
        .route(
            "/api/v1/ingest",
            get(handlers::get_ingest_status).post(handlers::start_ingest),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

impl ApiServer {
    pub fn new(app: Arc<AppState>, refresh: RefreshHandle) -> Self {
        Self {
            state: Arc::new(ApiState::new(app, refresh)),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Bind and serve in the background. Returns the bound address, so port 0
    /// picks a free port.
    pub async fn start(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address {}:{}: {}", host, port, e)))?;

        let app = router(Arc::clone(&self.state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        info!("Starting confluence scanner API server on {}", bound);

        self.task = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("=== Endpoints ===");
        info!("  GET  http://{}/health", bound);
        info!("  GET  http://{}/api/v1/matrix", bound);
        info!("  POST http://{}/api/v1/refresh", bound);
        info!("  GET  http://{}/api/v1/counts", bound);
        info!("  GET  http://{}/api/v1/ingest", bound);
        info!("  POST http://{}/api/v1/ingest", bound);

        Ok(bound)
    }

    /// Signal shutdown and wait for in-flight requests to drain
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("API server task failed: {}", e);
            }
        }
    }
}
