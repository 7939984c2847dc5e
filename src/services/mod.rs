//! Services Layer
//!
//! Scanner logic shared between the CLI and the REST API handlers.
//!
//! # Architecture
//!
//! ```text
//! CLI ──────────┐
//!               ├──> Services --> DataSource / BarStore / Classifier
//! REST API ─────┘
//! ```
//!
//! # Services
//!
//! - `IngestService` - Fetch, compute indicators, upsert
//! - `ScannerService` - Join latest snapshots, classify, project for display

pub mod ingest_service;
pub mod scanner_service;

pub use ingest_service::{IngestReport, IngestService, UnitOutcome, UnitReport, UnitStatus, UnitStatusEntry};
pub use scanner_service::{DisplayRow, MatrixStatus, MatrixView, ScannerService};
