//! Scrape-driven registry: every collect runs exactly one pass

use crate::collector::{CollectionReport, Collector};
use async_trait::async_trait;
use gauge_metrics::{MetricDescriptor, MetricSeries, MetricSet, ScrapeSource};
use std::sync::{Arc, PoisonError, RwLock};

/// Exposes the collector to the scrape endpoint
#[derive(Debug)]
pub struct ExporterRegistry {
    collector: Arc<Collector>,
    metrics: MetricSet,
    last_report: RwLock<Option<CollectionReport>>,
}

impl ExporterRegistry {
    pub fn new(collector: Arc<Collector>) -> Self {
        let metrics = collector.metrics().clone();
        Self {
            collector,
            metrics,
            last_report: RwLock::new(None),
        }
    }

    /// Every family this exporter may publish
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        self.metrics.describe()
    }

    /// Run a pass and return the resulting snapshot
    pub async fn collect(&self) -> Vec<MetricSeries> {
        self.run_pass().await;
        self.metrics.read_all()
    }

    /// Report of the most recent pass
    pub fn last_report(&self) -> Option<CollectionReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run_pass(&self) -> CollectionReport {
        let report = self.collector.collect().await;
        *self
            .last_report
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }
}

#[async_trait]
impl ScrapeSource for ExporterRegistry {
    async fn scrape(&self) -> gauge_metrics::Result<String> {
        self.run_pass().await;
        self.metrics.encode_text()
    }

    /// Unhealthy once a pass completes with every subsystem failing
    fn is_healthy(&self) -> bool {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, CollectionReport::any_succeeded)
    }
}
