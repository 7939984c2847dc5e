//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No data available for {instrument} ({timeframe})")]
    DataUnavailable {
        instrument: String,
        timeframe: String,
    },

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DuckDb(_) => "DUCKDB_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            AppError::DataSource(_) => "DATA_SOURCE_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error response for API consumers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let response = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        response.serialize(serializer)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_code() {
        let err = AppError::DataUnavailable {
            instrument: "SPY".to_string(),
            timeframe: "1h".to_string(),
        };
        let response = ErrorResponse::from(err);
        assert_eq!(response.code, "DATA_UNAVAILABLE");
        assert_eq!(response.message, "No data available for SPY (1h)");
    }

    #[test]
    fn test_validation_and_config_codes_differ() {
        assert_eq!(AppError::Validation("empty".to_string()).code(), "VALIDATION_ERROR");
        assert_eq!(AppError::Config("unreadable".to_string()).code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_error_serializes_as_response() {
        let err = AppError::Timeout("fetch SPY 1d".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TIMEOUT");
        assert_eq!(json["message"], "Timed out: fetch SPY 1d");
    }
}
