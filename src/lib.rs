//! Confluence Scanner - multi-timeframe technical analysis
//!
//! Maintains daily and hourly indicator snapshots for a watchlist and
//! classifies each instrument into a confluence status for display.

pub mod api;
pub mod config;
pub mod confluence;
pub mod datasource;
pub mod db;
pub mod error;
pub mod indicators;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod types;

use api::ApiServer;
use error::Result;
use scheduler::RefreshScheduler;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence_scanner=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run the refresh scheduler and the API server until Ctrl-C
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let (refresh, refresh_task) = RefreshScheduler::new(Arc::clone(&state)).start();

    let mut server = ApiServer::new(Arc::clone(&state), refresh);
    server
        .start(&state.config.http.host, state.config.http.port)
        .await?;

    tracing::info!("Scanner running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    server.stop().await;
    refresh_task.abort();
    tracing::info!("Scanner stopped");
    Ok(())
}
