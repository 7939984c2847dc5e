//! Scanner configuration
//!
//! Loaded from an optional JSON file, then overridden by `CONFLUENCE_*`
//! environment variables. Every field has a default so a partial file works.

use crate::confluence::ClassifierThresholds;
use crate::error::{AppError, Result};
use crate::indicators::IndicatorParams;
use crate::types::Timeframe;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "confluence.json";

/// How much history to request for one timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub timeframe: Timeframe,
    /// Provider lookback range, e.g. "1y", "60d"
    pub lookback: String,
    /// Provider bar interval, e.g. "1d", "1h"
    pub interval: String,
}

impl FetchSpec {
    pub fn new(timeframe: Timeframe, lookback: &str, interval: &str) -> Self {
        Self {
            timeframe,
            lookback: lookback.to_string(),
            interval: interval.to_string(),
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Ordered instrument identifiers
    pub watchlist: Vec<String>,
    pub db_path: PathBuf,
    pub indicators: IndicatorParams,
    pub thresholds: ClassifierThresholds,
    pub fetch: Vec<FetchSpec>,
    pub refresh_interval_secs: u64,
    pub max_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub http: HttpConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            watchlist: [
                "SPY", "QQQ", "IWM", // Indices
                "AAPL", "NVDA", "MSFT", "TSLA", "AMD", "AMZN", "GOOGL", "META", // Tech
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            db_path: PathBuf::from("market_data.duckdb"),
            indicators: IndicatorParams::default(),
            thresholds: ClassifierThresholds::default(),
            fetch: vec![
                FetchSpec::new(Timeframe::Daily, "1y", "1d"),
                FetchSpec::new(Timeframe::Hourly, "60d", "1h"),
            ],
            refresh_interval_secs: 60,
            max_concurrency: 4,
            fetch_timeout_secs: 30,
            http: HttpConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `confluence.json` in the
    /// working directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `CONFLUENCE_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Some(list) = env_str("CONFLUENCE_WATCHLIST") {
            self.watchlist = parse_watchlist(&list);
        }
        if let Some(path) = env_str("CONFLUENCE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        self.refresh_interval_secs = env_parse("CONFLUENCE_REFRESH_SECS", self.refresh_interval_secs);
        self.max_concurrency = env_parse("CONFLUENCE_MAX_CONCURRENCY", self.max_concurrency);
        self.fetch_timeout_secs = env_parse("CONFLUENCE_FETCH_TIMEOUT_SECS", self.fetch_timeout_secs);
        if let Some(host) = env_str("CONFLUENCE_HTTP_HOST") {
            self.http.host = host;
        }
        self.http.port = env_parse("CONFLUENCE_HTTP_PORT", self.http.port);
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchlist.is_empty() {
            return Err(AppError::Validation("Watchlist is empty".to_string()));
        }
        if self.watchlist.iter().any(|s| s.trim().is_empty()) {
            return Err(AppError::Validation("Watchlist contains a blank instrument".to_string()));
        }
        if self.fetch.is_empty() {
            return Err(AppError::Validation("No fetch timeframes configured".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(AppError::Validation("max_concurrency must be at least 1".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(AppError::Validation("refresh_interval_secs must be at least 1".to_string()));
        }
        self.indicators.validate()
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_str(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated watchlist, keeping order and dropping duplicates.
pub fn parse_watchlist(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}
