//! REST API types

use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Envelope for every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            code: None,
            data: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            code: None,
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.to_string()),
            code: None,
            data: None,
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(err.to_string()),
            code: Some(err.code().to_string()),
            data: None,
        }
    }
}

/// Empty payload for message-only responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empty {}
