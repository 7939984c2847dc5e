//! REST API server module
//!
//! Provides, for a presentation layer to poll:
//! - Health check (/health)
//! - Classified display matrix and manual refresh (/api/v1/matrix, /api/v1/refresh)
//! - Store row counts (/api/v1/counts)
//! - Ingest trigger and per-unit status (/api/v1/ingest)

pub mod handlers;
mod server;
mod types;

pub use handlers::ApiState;
pub use server::{router, ApiServer};
pub use types::{ApiResponse, Empty};
