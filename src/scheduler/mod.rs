//! Scheduler module for the confluence scanner
//!
//! Handles scheduled tasks:
//! - Periodic and on-demand refresh of the display matrix

mod refresh;

pub use refresh::{refresh_once, RefreshHandle, RefreshScheduler};
