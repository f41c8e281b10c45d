//! HTTP endpoint for serving metrics

use crate::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Something that produces a Prometheus text snapshot on demand
///
/// The endpoint calls [`ScrapeSource::scrape`] once per request, so a source
/// that collects fresh data on every call gives pull-driven collection.
#[async_trait]
pub trait ScrapeSource: Send + Sync + 'static {
    async fn scrape(&self) -> Result<String>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP endpoint for serving metrics and health checks
pub struct MetricsEndpoint {
    source: Arc<dyn ScrapeSource>,
    bind_addr: SocketAddr,
    metrics_path: String,
}

impl std::fmt::Debug for MetricsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEndpoint")
            .field("bind_addr", &self.bind_addr)
            .field("metrics_path", &self.metrics_path)
            .finish()
    }
}

impl MetricsEndpoint {
    /// Create a new metrics endpoint serving `/metrics`
    pub fn new(source: Arc<dyn ScrapeSource>, bind_addr: SocketAddr) -> Self {
        Self {
            source,
            bind_addr,
            metrics_path: "/metrics".to_string(),
        }
    }

    /// Serve metrics on a different path
    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// Serve in the current task until `shutdown` resolves, then drain in-flight requests
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_app(self.source.clone(), &self.metrics_path);

        info!(
            "Serving metrics on http://{}{}",
            listener.local_addr()?,
            self.metrics_path
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Metrics endpoint stopped");
        Ok(())
    }
}

/// Create the Axum application
fn create_app(source: Arc<dyn ScrapeSource>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(source)
}

/// Handler for the metrics path
async fn metrics_handler(State(source): State<Arc<dyn ScrapeSource>>) -> Response {
    match source.scrape().await {
        Ok(body) => {
            debug!("Served scrape ({} bytes)", body.len());
            (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            warn!("Failed to produce metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get metrics").into_response()
        }
    }
}

/// Handler for /health endpoint
async fn health_handler(State(source): State<Arc<dyn ScrapeSource>>) -> Response {
    let (status, label) = if source.is_healthy() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(json!({
            "status": label,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}
