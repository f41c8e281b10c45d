//! # gauge-agent
//!
//! The OpenStack tenant exporter process.
//!
//! This crate wires the OpenStack ports, the collector and the metrics
//! endpoint together: every scrape of `/metrics` runs one collection pass
//! for the configured tenant and returns the resulting snapshot.

pub mod agent;
pub mod collector;
pub mod config;
pub mod registry;

// Re-export commonly used types
pub use agent::Agent;
pub use collector::{CollectionReport, Collector, SubsystemReport};
pub use config::{AgentConfig, LoggingConfig};
pub use registry::ExporterRegistry;

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] gauge_core::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] gauge_metrics::MetricsError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Initialize logging and tracing
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so `once` output on stdout stays clean.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(logging_config.show_target)
        .with_thread_ids(logging_config.show_thread_ids)
        .with_line_number(logging_config.show_line_numbers);

    let installed = match logging_config.format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };

    installed.map_err(|e| AgentError::Config(format!("Failed to initialize logging: {}", e)))
}
