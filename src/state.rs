//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::GstatMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// State shared between the scrape handlers and the ingestion task. The
/// ingestion task is the only writer; handlers only read gauge values
/// through the registry.
pub struct AppState {
    pub registry: Registry,
    pub metrics: GstatMetrics,
    /// Server start time for uptime display.
    pub start_time: Instant,
}
