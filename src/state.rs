//! Application state management

use crate::config::ScannerConfig;
use crate::datasource::{DataSource, YahooSource};
use crate::db::duckdb::DuckDb;
use crate::db::BarStore;
use crate::error::Result;
use crate::services::ingest_service::UnitStatus;
use crate::types::Timeframe;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared application state, constructed once and passed explicitly
pub struct AppState {
    pub config: ScannerConfig,

    /// Candle store
    pub store: Arc<dyn BarStore>,

    /// Bar provider
    pub source: Arc<dyn DataSource>,

    /// Last ingest outcome per (instrument, timeframe)
    pub ingest_status: DashMap<(String, Timeframe), UnitStatus>,
}

impl AppState {
    /// Open the DuckDB store at the configured path and the Yahoo source
    pub fn new(config: ScannerConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Arc::new(DuckDb::new(&config.db_path)?);
        info!("DuckDB opened at {}", config.db_path.display());

        let source = Arc::new(YahooSource::new(Duration::from_secs(config.fetch_timeout_secs))?);

        Ok(Self::with_parts(config, store, source))
    }

    /// Assemble state from already-built parts
    pub fn with_parts(
        config: ScannerConfig,
        store: Arc<dyn BarStore>,
        source: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            ingest_status: DashMap::new(),
        }
    }
}
