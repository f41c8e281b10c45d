//! One collection pass over every subsystem
//!
//! The collector queries each subsystem port, turns the answers into a
//! [`MetricBatch`] per subsystem and applies the batches to the shared
//! [`MetricSet`] in a fixed order. A subsystem that fails is logged and
//! skipped; its previous series stay as they were and the rest of the pass
//! carries on.

use gauge_core::{
    normalize, CollectorConfig, Error, InstanceKind, LabelSet, Quota, ResourceInstance,
    ResourceKind, Subsystem, SubsystemPorts, TenantContext,
};
use gauge_metrics::families::{
    SNAPSHOT_SIZE, SNAPSHOT_STATUS, SUBSYSTEM_DURATION, SUBSYSTEM_UP, VOLUME_SIZE, VOLUME_STATUS,
};
use gauge_metrics::{ApplyStats, MetricBatch, MetricSet};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of one subsystem within a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemReport {
    pub subsystem: Subsystem,
    pub success: bool,
    pub error: Option<String>,
    /// Short error class (`transport`, `timeout`, `decode`, ...)
    pub error_category: Option<&'static str>,
    pub duration: Duration,
    pub written: usize,
    pub pruned: usize,
}

/// Outcome of a full pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub subsystems: Vec<SubsystemReport>,
    pub duration: Duration,
}

impl CollectionReport {
    pub fn get(&self, subsystem: Subsystem) -> Option<&SubsystemReport> {
        self.subsystems.iter().find(|r| r.subsystem == subsystem)
    }

    pub fn all_succeeded(&self) -> bool {
        self.subsystems.iter().all(|r| r.success)
    }

    pub fn any_succeeded(&self) -> bool {
        self.subsystems.iter().any(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SubsystemReport> {
        self.subsystems.iter().filter(|r| !r.success)
    }
}

/// Series gathered for one subsystem, plus the error that cut it short
#[derive(Debug, Default)]
struct Fetched {
    batch: MetricBatch,
    error: Option<Error>,
}

impl Fetched {
    fn ok(batch: MetricBatch) -> Self {
        Self { batch, error: None }
    }

    fn failed(error: Error) -> Self {
        Self {
            batch: MetricBatch::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug)]
struct SubsystemOutcome {
    subsystem: Subsystem,
    fetched: Fetched,
    elapsed: Duration,
}

/// Drives collection passes for one tenant
#[derive(Debug)]
pub struct Collector {
    tenant: TenantContext,
    ports: SubsystemPorts,
    metrics: MetricSet,
    timeout: Duration,
    concurrent: bool,
    pass_lock: Mutex<()>,
}

impl Collector {
    pub fn new(
        tenant: TenantContext,
        ports: SubsystemPorts,
        metrics: MetricSet,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            tenant,
            ports,
            metrics,
            timeout: config.timeout(),
            concurrent: config.concurrent,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    /// Run one pass. Never fails as a whole; per-subsystem failures are in the report.
    pub async fn collect(&self) -> CollectionReport {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();

        let outcomes = if self.concurrent {
            let (compute, storage, load_balancer, network, volumes, snapshots) = tokio::join!(
                self.fetch(Subsystem::ComputeLimits),
                self.fetch(Subsystem::StorageLimits),
                self.fetch(Subsystem::LoadBalancer),
                self.fetch(Subsystem::NetworkLimits),
                self.fetch(Subsystem::Volumes),
                self.fetch(Subsystem::Snapshots),
            );
            vec![compute, storage, load_balancer, network, volumes, snapshots]
        } else {
            let mut outcomes = Vec::with_capacity(Subsystem::ALL.len());
            for subsystem in Subsystem::ALL {
                outcomes.push(self.fetch(subsystem).await);
            }
            outcomes
        };

        let mut self_metrics = MetricBatch::new();
        let mut reports = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            let report = self.apply(outcome);
            let labels = LabelSet::subsystem(report.subsystem);
            self_metrics.set(SUBSYSTEM_UP, labels.clone(), if report.success { 1.0 } else { 0.0 });
            self_metrics.set(SUBSYSTEM_DURATION, labels, report.duration.as_secs_f64());
            reports.push(report);
        }

        if let Err(e) = self.metrics.apply(self_metrics) {
            warn!("Failed to record subsystem status: {}", e);
        }

        let report = CollectionReport {
            subsystems: reports,
            duration: started.elapsed(),
        };

        let failed = report.failed().count();
        if failed == 0 {
            info!("Collection pass for {} finished in {:?}", self.tenant, report.duration);
        } else {
            warn!(
                "Collection pass for {} finished in {:?} with {} failed subsystem(s)",
                self.tenant, report.duration, failed
            );
        }

        report
    }

    async fn fetch(&self, subsystem: Subsystem) -> SubsystemOutcome {
        let started = Instant::now();

        let fetched = match tokio::time::timeout(self.timeout, self.query(subsystem)).await {
            Ok(fetched) => fetched,
            Err(_) => Fetched::failed(Error::timeout(format!(
                "{} did not answer within {:?}",
                subsystem, self.timeout
            ))),
        };

        SubsystemOutcome {
            subsystem,
            fetched,
            elapsed: started.elapsed(),
        }
    }

    async fn query(&self, subsystem: Subsystem) -> Fetched {
        let tenant = &self.tenant;

        match subsystem {
            Subsystem::ComputeLimits => match self.ports.compute.compute_limits(tenant).await {
                Ok(quotas) => Fetched::ok(quota_batch(tenant, &quotas)),
                Err(e) => Fetched::failed(e),
            },
            Subsystem::StorageLimits => match self.ports.block_storage.storage_limits(tenant).await {
                Ok(quotas) => Fetched::ok(quota_batch(tenant, &quotas)),
                Err(e) => Fetched::failed(e),
            },
            Subsystem::LoadBalancer => self.query_load_balancers().await,
            Subsystem::NetworkLimits => match self.ports.network.network_quota(tenant).await {
                Ok(quotas) => Fetched::ok(quota_batch(tenant, &quotas)),
                Err(e) => Fetched::failed(e),
            },
            Subsystem::Volumes => match self.ports.block_storage.list_volumes(tenant).await {
                Ok(volumes) => Fetched::ok(volume_batch(tenant, &volumes)),
                Err(e) => Fetched::failed(e),
            },
            Subsystem::Snapshots => match self.ports.block_storage.list_snapshots(tenant).await {
                Ok(snapshots) => Fetched::ok(snapshot_batch(tenant, &snapshots)),
                Err(e) => Fetched::failed(e),
            },
        }
    }

    /// Without the quota nothing is written; a failed listing still publishes the quota.
    async fn query_load_balancers(&self) -> Fetched {
        let tenant = &self.tenant;

        let max = match self.ports.load_balancer.load_balancer_quota(tenant).await {
            Ok(max) => max,
            Err(e) => return Fetched::failed(e),
        };

        match self.ports.load_balancer.list_load_balancers(tenant).await {
            Ok(used) => Fetched::ok(quota_batch(
                tenant,
                &[Quota::new(
                    ResourceKind::LoadBalancers,
                    max,
                    i64::try_from(used).unwrap_or(i64::MAX),
                )],
            )),
            Err(e) => Fetched {
                batch: quota_batch(tenant, &[Quota::max_only(ResourceKind::LoadBalancers, max)]),
                error: Some(e),
            },
        }
    }

    fn apply(&self, outcome: SubsystemOutcome) -> SubsystemReport {
        let SubsystemOutcome {
            subsystem,
            fetched,
            elapsed,
        } = outcome;
        let mut category = fetched.error.as_ref().map(Error::category);
        let mut error = fetched.error.map(|e| e.to_string());

        let stats = if fetched.batch.is_empty() {
            ApplyStats::default()
        } else {
            match self.metrics.apply(fetched.batch) {
                Ok(stats) => stats,
                Err(e) => {
                    category.get_or_insert("metrics");
                    error.get_or_insert_with(|| e.to_string());
                    ApplyStats::default()
                }
            }
        };

        match error {
            Some(ref e) => warn!(
                category = category.unwrap_or("unknown"),
                "Failed to collect {} for {}: {}",
                subsystem,
                self.tenant,
                e
            ),
            None => debug!(
                "Collected {} in {:?}: {} written, {} pruned",
                subsystem, elapsed, stats.written, stats.pruned
            ),
        }

        SubsystemReport {
            subsystem,
            success: error.is_none(),
            error,
            error_category: category,
            duration: elapsed,
            written: stats.written,
            pruned: stats.pruned,
        }
    }
}

fn quota_batch(tenant: &TenantContext, quotas: &[Quota]) -> MetricBatch {
    let mut batch = MetricBatch::new();
    for quota in quotas {
        if let Some(max) = quota.max {
            batch.set(quota.kind.max_metric(), LabelSet::tenant(tenant), max as f64);
        }
        if let Some(used) = quota.used {
            batch.set(quota.kind.used_metric(), LabelSet::tenant(tenant), used as f64);
        }
    }
    batch
}

fn volume_batch(tenant: &TenantContext, volumes: &[ResourceInstance]) -> MetricBatch {
    let mut batch = MetricBatch::new();
    batch.replace(VOLUME_SIZE);
    batch.replace(VOLUME_STATUS);

    for volume in volumes {
        let labels = LabelSet::volume(tenant, volume);
        let status = normalize(InstanceKind::Volume, &volume.status);
        batch.set(VOLUME_SIZE, labels.clone(), volume.size as f64);
        batch.set(VOLUME_STATUS, labels, status as f64);
    }
    batch
}

fn snapshot_batch(tenant: &TenantContext, snapshots: &[ResourceInstance]) -> MetricBatch {
    let mut batch = MetricBatch::new();
    batch.replace(SNAPSHOT_SIZE);
    batch.replace(SNAPSHOT_STATUS);

    for snapshot in snapshots {
        let labels = LabelSet::snapshot(tenant, snapshot);
        let status = normalize(InstanceKind::Snapshot, &snapshot.status);
        batch.set(SNAPSHOT_SIZE, labels.clone(), snapshot.size as f64);
        batch.set(SNAPSHOT_STATUS, labels, status as f64);
    }
    batch
}
