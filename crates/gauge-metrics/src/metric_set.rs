//! The labeled gauge table shared between the collector and the scrape path
//!
//! Writes land through [`MetricSet::apply`], which takes a [`MetricBatch`]
//! under a single write lock. A batch may mark families as *replaced*: every
//! label set of such a family that the batch does not write again is removed,
//! which is how resources deleted upstream stop being published. Readers hold
//! the read lock, so they observe a batch either completely or not at all.

use crate::families::{FamilySpec, FAMILIES};
use crate::{MetricDescriptor, MetricsError, Result};
use gauge_core::LabelSet;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// One published series
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub name: String,

    /// Label name/value pairs in family label order
    pub labels: Vec<(String, String)>,

    pub value: f64,
}

impl MetricSeries {
    /// Get a label value by name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A set of writes applied to the metric set atomically
#[derive(Debug, Clone, Default)]
pub struct MetricBatch {
    writes: Vec<(String, LabelSet, f64)>,
    replaced: Vec<String>,
}

impl MetricBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one series
    pub fn set(&mut self, name: &str, labels: LabelSet, value: f64) {
        self.writes.push((name.to_string(), labels, value));
    }

    /// Declare that this batch carries the complete contents of a family
    pub fn replace(&mut self, name: &str) {
        if !self.replaced.iter().any(|n| n == name) {
            self.replaced.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.replaced.is_empty()
    }
}

/// Counters describing one applied batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub written: usize,
    pub pruned: usize,
}

struct Family {
    spec: &'static FamilySpec,
    gauges: GaugeVec,
    live: BTreeSet<LabelSet>,
}

struct MetricSetInner {
    registry: Registry,
    families: RwLock<HashMap<&'static str, Family>>,
}

/// Shared handle to the exporter's gauges
#[derive(Clone)]
pub struct MetricSet {
    inner: Arc<MetricSetInner>,
}

impl std::fmt::Debug for MetricSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSet")
            .field("families", &FAMILIES.len())
            .field("series", &self.series_count())
            .finish()
    }
}

impl MetricSet {
    /// Create a metric set with every published family registered
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let mut families = HashMap::with_capacity(FAMILIES.len());

        for spec in FAMILIES {
            let gauges = GaugeVec::new(Opts::new(spec.name, spec.help), spec.labels)?;
            registry.register(Box::new(gauges.clone())).map_err(|e| {
                MetricsError::Registry(format!("Failed to register {}: {}", spec.name, e))
            })?;
            families.insert(
                spec.name,
                Family {
                    spec,
                    gauges,
                    live: BTreeSet::new(),
                },
            );
        }

        Ok(Self {
            inner: Arc::new(MetricSetInner {
                registry,
                families: RwLock::new(families),
            }),
        })
    }

    /// Upsert a single series
    pub fn write(&self, name: &str, labels: LabelSet, value: f64) -> Result<()> {
        let mut batch = MetricBatch::new();
        batch.set(name, labels, value);
        self.apply(batch).map(|_| ())
    }

    /// Apply a batch atomically. Nothing is written if any entry is invalid.
    pub fn apply(&self, batch: MetricBatch) -> Result<ApplyStats> {
        let mut families = self
            .inner
            .families
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for (name, labels, _) in &batch.writes {
            let family = families
                .get(name.as_str())
                .ok_or_else(|| MetricsError::UnknownFamily(name.clone()))?;
            if labels.len() != family.spec.labels.len() {
                return Err(MetricsError::LabelMismatch {
                    family: name.clone(),
                    expected: family.spec.labels.len(),
                    actual: labels.len(),
                });
            }
        }
        for name in &batch.replaced {
            if !families.contains_key(name.as_str()) {
                return Err(MetricsError::UnknownFamily(name.clone()));
            }
        }

        let mut stats = ApplyStats::default();

        for name in &batch.replaced {
            let keep: HashSet<&LabelSet> = batch
                .writes
                .iter()
                .filter(|(n, _, _)| n == name)
                .map(|(_, labels, _)| labels)
                .collect();

            if let Some(family) = families.get_mut(name.as_str()) {
                let stale: Vec<LabelSet> = family
                    .live
                    .iter()
                    .filter(|labels| !keep.contains(labels))
                    .cloned()
                    .collect();

                for labels in stale {
                    // Already absent from the vector if this fails; drop it from `live` either way.
                    let _ = family.gauges.remove_label_values(&labels.as_strs());
                    family.live.remove(&labels);
                    debug!("Pruned stale series {}{}", name, labels);
                    stats.pruned += 1;
                }
            }
        }

        for (name, labels, value) in batch.writes {
            if let Some(family) = families.get_mut(name.as_str()) {
                family.gauges.with_label_values(&labels.as_strs()).set(value);
                family.live.insert(labels);
                stats.written += 1;
            }
        }

        Ok(stats)
    }

    /// Replace the whole contents of one family
    pub fn replace_family<I>(&self, name: &str, series: I) -> Result<ApplyStats>
    where
        I: IntoIterator<Item = (LabelSet, f64)>,
    {
        let mut batch = MetricBatch::new();
        batch.replace(name);
        for (labels, value) in series {
            batch.set(name, labels, value);
        }
        self.apply(batch)
    }

    /// Current value of one series, if it is published
    pub fn get(&self, name: &str, labels: &LabelSet) -> Option<f64> {
        let families = self
            .inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let family = families.get(name)?;
        if !family.live.contains(labels) {
            return None;
        }
        family
            .gauges
            .get_metric_with_label_values(&labels.as_strs())
            .ok()
            .map(|gauge| gauge.get())
    }

    /// Every published series, grouped by family in catalogue order
    pub fn read_all(&self) -> Vec<MetricSeries> {
        let families = self
            .inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut series = Vec::new();
        for spec in FAMILIES {
            let Some(family) = families.get(spec.name) else {
                continue;
            };
            for labels in &family.live {
                let Ok(gauge) = family.gauges.get_metric_with_label_values(&labels.as_strs()) else {
                    continue;
                };
                series.push(MetricSeries {
                    name: spec.name.to_string(),
                    labels: spec
                        .labels
                        .iter()
                        .zip(labels.values())
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect(),
                    value: gauge.get(),
                });
            }
        }
        series
    }

    /// Number of published series across all families
    pub fn series_count(&self) -> usize {
        let families = self
            .inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        families.values().map(|f| f.live.len()).sum()
    }

    /// Descriptors of every family, published or not
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        FAMILIES.iter().map(FamilySpec::descriptor).collect()
    }

    /// Encode the snapshot in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String> {
        // Hold the read lock so the encoded snapshot never straddles a batch.
        let _families = self
            .inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Export(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Export(format!("Failed to convert metrics to string: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{SNAPSHOT_SIZE, VOLUME_SIZE, VOLUME_STATUS};

    fn volume_labels(id: &str, name: &str) -> LabelSet {
        LabelSet::new(["t1", id, name])
    }

    #[test]
    fn test_write_is_upsert() {
        let metrics = MetricSet::new().unwrap();
        let labels = LabelSet::new(["t1"]);

        metrics.write("openstack_max_total_cores", labels.clone(), 20.0).unwrap();
        metrics.write("openstack_max_total_cores", labels.clone(), 24.0).unwrap();

        let series: Vec<_> = metrics
            .read_all()
            .into_iter()
            .filter(|s| s.name == "openstack_max_total_cores")
            .collect();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 24.0);
        assert_eq!(series[0].label("tenant_id"), Some("t1"));
    }

    #[test]
    fn test_label_mismatch_rejected() {
        let metrics = MetricSet::new().unwrap();
        let err = metrics
            .write(VOLUME_SIZE, LabelSet::new(["t1", "v1"]), 1.0)
            .unwrap_err();
        assert!(matches!(err, MetricsError::LabelMismatch { expected: 3, actual: 2, .. }));
        assert_eq!(metrics.series_count(), 0);
    }

    #[test]
    fn test_unknown_family_rejected() {
        let metrics = MetricSet::new().unwrap();
        let err = metrics
            .write("openstack_unknown", LabelSet::new(["t1"]), 1.0)
            .unwrap_err();
        assert!(matches!(err, MetricsError::UnknownFamily(_)));
    }

    #[test]
    fn test_invalid_batch_is_not_partially_applied() {
        let metrics = MetricSet::new().unwrap();
        let mut batch = MetricBatch::new();
        batch.set(VOLUME_SIZE, volume_labels("v1", "data"), 50.0);
        batch.set(VOLUME_STATUS, LabelSet::new(["t1"]), 4.0);

        assert!(metrics.apply(batch).is_err());
        assert_eq!(metrics.series_count(), 0);
    }

    #[test]
    fn test_replace_prunes_absent_series() {
        let metrics = MetricSet::new().unwrap();

        let mut first = MetricBatch::new();
        first.replace(VOLUME_SIZE);
        first.set(VOLUME_SIZE, volume_labels("v1", "data"), 50.0);
        first.set(VOLUME_SIZE, volume_labels("v2", "logs"), 10.0);
        let stats = metrics.apply(first).unwrap();
        assert_eq!(stats, ApplyStats { written: 2, pruned: 0 });

        let mut second = MetricBatch::new();
        second.replace(VOLUME_SIZE);
        second.set(VOLUME_SIZE, volume_labels("v2", "logs"), 12.0);
        let stats = metrics.apply(second).unwrap();
        assert_eq!(stats, ApplyStats { written: 1, pruned: 1 });

        assert_eq!(metrics.get(VOLUME_SIZE, &volume_labels("v1", "data")), None);
        assert_eq!(metrics.get(VOLUME_SIZE, &volume_labels("v2", "logs")), Some(12.0));

        let text = metrics.encode_text().unwrap();
        assert!(!text.contains("volume_id=\"v1\""));
        assert!(text.contains("volume_id=\"v2\""));
    }

    #[test]
    fn test_replace_with_empty_listing_clears_family() {
        let metrics = MetricSet::new().unwrap();
        metrics.write(VOLUME_SIZE, volume_labels("v1", "data"), 50.0).unwrap();

        let mut batch = MetricBatch::new();
        batch.replace(VOLUME_SIZE);
        metrics.apply(batch).unwrap();

        assert_eq!(metrics.series_count(), 0);
    }

    #[test]
    fn test_replace_leaves_other_families_alone() {
        let metrics = MetricSet::new().unwrap();
        metrics
            .write(SNAPSHOT_SIZE, LabelSet::new(["t1", "s1", "nightly", "v1"]), 5.0)
            .unwrap();

        let mut batch = MetricBatch::new();
        batch.replace(VOLUME_SIZE);
        metrics.apply(batch).unwrap();

        assert_eq!(
            metrics.get(SNAPSHOT_SIZE, &LabelSet::new(["t1", "s1", "nightly", "v1"])),
            Some(5.0)
        );
    }

    #[test]
    fn test_renamed_volume_replaces_series() {
        let metrics = MetricSet::new().unwrap();

        let mut first = MetricBatch::new();
        first.replace(VOLUME_SIZE);
        first.set(VOLUME_SIZE, volume_labels("v1", "data"), 50.0);
        metrics.apply(first).unwrap();

        let mut second = MetricBatch::new();
        second.replace(VOLUME_SIZE);
        second.set(VOLUME_SIZE, volume_labels("v1", "data-renamed"), 50.0);
        metrics.apply(second).unwrap();

        let series = metrics.read_all();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label("volume_name"), Some("data-renamed"));
    }

    #[test]
    fn test_replace_family() {
        let metrics = MetricSet::new().unwrap();
        metrics.write(VOLUME_SIZE, volume_labels("v1", "data"), 50.0).unwrap();

        let stats = metrics
            .replace_family(VOLUME_SIZE, vec![(volume_labels("v2", "logs"), 10.0)])
            .unwrap();

        assert_eq!(stats, ApplyStats { written: 1, pruned: 1 });
        assert_eq!(metrics.get(VOLUME_SIZE, &volume_labels("v1", "data")), None);
        assert_eq!(metrics.get(VOLUME_SIZE, &volume_labels("v2", "logs")), Some(10.0));
    }

    #[test]
    fn test_read_all_label_order() {
        let metrics = MetricSet::new().unwrap();
        metrics
            .write(SNAPSHOT_SIZE, LabelSet::new(["t1", "s1", "nightly", "v1"]), 5.0)
            .unwrap();

        let series = metrics.read_all();
        let names: Vec<_> = series[0].labels.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["tenant_id", "snap_id", "snap_name", "volume_id"]);
    }

    #[test]
    fn test_encode_text() {
        let metrics = MetricSet::new().unwrap();
        metrics
            .write("openstack_max_total_ram", LabelSet::new(["t1"]), 16384.0)
            .unwrap();

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("# HELP openstack_max_total_ram"));
        assert!(text.contains("# TYPE openstack_max_total_ram gauge"));
        assert!(text.contains("openstack_max_total_ram{tenant_id=\"t1\"} 16384"));
    }

    #[test]
    fn test_control_characters_survive_encoding() {
        let metrics = MetricSet::new().unwrap();
        metrics
            .write(VOLUME_SIZE, volume_labels("v1", "data\tbackup"), 50.0)
            .unwrap();
        metrics
            .write(VOLUME_SIZE, volume_labels("v2", "line\nbreak"), 10.0)
            .unwrap();

        assert_eq!(metrics.get(VOLUME_SIZE, &volume_labels("v1", "data\tbackup")), Some(50.0));

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("volume_name=\"data\tbackup\"} 50"));
        assert!(text.contains("volume_name=\"line\\nbreak\"} 10"));
    }

    #[test]
    fn test_describe() {
        let metrics = MetricSet::new().unwrap();
        let descriptors = metrics.describe();
        assert_eq!(descriptors.len(), FAMILIES.len());
        assert!(descriptors.iter().any(|d| d.name == VOLUME_STATUS));
    }

    #[test]
    fn test_clones_share_state() {
        let metrics = MetricSet::new().unwrap();
        let reader = metrics.clone();
        metrics
            .write("openstack_max_floatingips", LabelSet::new(["t1"]), 10.0)
            .unwrap();
        assert_eq!(
            reader.get("openstack_max_floatingips", &LabelSet::new(["t1"])),
            Some(10.0)
        );
    }
}
