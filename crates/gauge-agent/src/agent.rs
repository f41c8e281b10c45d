//! Exporter process lifecycle

use crate::collector::Collector;
use crate::config::AgentConfig;
use crate::registry::ExporterRegistry;
use crate::Result;
use gauge_core::{SubsystemPorts, TenantContext};
use gauge_metrics::{MetricSet, MetricsEndpoint, ScrapeSource};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// A configured exporter for one tenant
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    registry: Arc<ExporterRegistry>,
}

impl Agent {
    /// Authenticate against OpenStack and build the exporter
    pub async fn connect(config: AgentConfig) -> Result<Self> {
        let connection =
            gauge_openstack::connect(&config.core.openstack, config.core.collector.timeout())
                .await?;
        Self::new(config, connection.tenant, connection.ports)
    }

    /// Build the exporter around already constructed ports
    pub fn new(config: AgentConfig, tenant: TenantContext, ports: SubsystemPorts) -> Result<Self> {
        let metrics = MetricSet::new()?;
        let collector = Collector::new(tenant, ports, metrics, &config.core.collector);
        let registry = Arc::new(ExporterRegistry::new(Arc::new(collector)));

        Ok(Self { config, registry })
    }

    pub fn registry(&self) -> &Arc<ExporterRegistry> {
        &self.registry
    }

    /// Run a single pass and return the text exposition
    pub async fn collect_once(&self) -> Result<String> {
        Ok(self.registry.scrape().await?)
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = &self.config.core.server;
        info!(
            "Starting OpenStack tenant exporter on {}{}",
            server.bind_addr, server.metrics_path
        );

        let endpoint = MetricsEndpoint::new(self.registry.clone(), server.bind_addr)
            .with_metrics_path(server.metrics_path.clone());
        endpoint.serve_with_shutdown(shutdown).await?;

        info!("Exporter stopped");
        Ok(())
    }
}

/// Wait for termination signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C signal");
        }
    }
}

/// Wait for termination signals (Windows)
#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::MockCloud;

    fn agent() -> Agent {
        let cloud = MockCloud::scenario();
        let mut config = AgentConfig::default();
        config.core.server.bind_addr = "127.0.0.1:0".parse().unwrap();
        Agent::new(config, TenantContext::new("t1"), cloud.ports()).unwrap()
    }

    #[tokio::test]
    async fn test_collect_once() {
        let text = agent().collect_once().await.unwrap();
        assert!(text.contains("openstack_total_cores_used{tenant_id=\"t1\"} 6"));
        assert!(text.contains("openstack_snapshot_size"));
    }

    #[tokio::test]
    async fn test_registry_records_report() {
        let agent = agent();
        agent.collect_once().await.unwrap();
        assert!(agent.registry().last_report().unwrap().all_succeeded());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(agent().run_until(async move {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
