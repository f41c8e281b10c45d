//! # gauge-metrics
//!
//! Metric storage and exposition for stackgauge.
//!
//! This crate provides:
//! - The fixed catalogue of published gauge families and their label schemas
//! - [`MetricSet`], the labeled gauge table a collection pass writes into,
//!   with atomic per-family replacement so deleted resources stop being served
//! - Prometheus text encoding of the current snapshot
//! - An axum HTTP endpoint that triggers a scrape on every request

pub mod endpoint;
pub mod families;
pub mod metric_set;

// Re-export commonly used types
pub use endpoint::{MetricsEndpoint, ScrapeSource};
pub use families::{FamilySpec, MetricDescriptor, FAMILIES};
pub use metric_set::{ApplyStats, MetricBatch, MetricSeries, MetricSet};

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Unknown metric family: {0}")]
    UnknownFamily(String),

    #[error("Label mismatch for {family}: expected {expected} values, got {actual}")]
    LabelMismatch {
        family: String,
        expected: usize,
        actual: usize,
    },

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
