//! Label schema for stackgauge series
//!
//! Every published series is keyed by an ordered list of label values. The
//! label names for each metric family are fixed; a [`LabelSet`] only carries
//! the values, in the same order as the family's label names.

use crate::{ResourceInstance, TenantContext};
use std::fmt;

/// Label names for tenant-scoped quota gauges
pub const TENANT_LABELS: &[&str] = &["tenant_id"];

/// Label names for per-volume gauges
pub const VOLUME_LABELS: &[&str] = &["tenant_id", "volume_id", "volume_name"];

/// Label names for per-snapshot gauges
pub const SNAPSHOT_LABELS: &[&str] = &["tenant_id", "snap_id", "snap_name", "volume_id"];

/// Label names for the exporter's own per-subsystem gauges
pub const SUBSYSTEM_LABELS: &[&str] = &["subsystem"];

/// Ordered label values identifying one series within a family
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    /// Create a label set from values in family label order
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(values.into_iter().map(|v| v.as_ref().to_string()).collect())
    }

    /// Labels for a tenant-scoped quota gauge
    pub fn tenant(tenant: &TenantContext) -> Self {
        Self::new([tenant.id()])
    }

    /// Labels for a per-volume gauge
    pub fn volume(tenant: &TenantContext, volume: &ResourceInstance) -> Self {
        Self::new([tenant.id(), volume.id.as_str(), volume.name.as_str()])
    }

    /// Labels for a per-snapshot gauge. A snapshot without an owning volume
    /// gets an empty `volume_id`.
    pub fn snapshot(tenant: &TenantContext, snapshot: &ResourceInstance) -> Self {
        Self::new([
            tenant.id(),
            snapshot.id.as_str(),
            snapshot.name.as_str(),
            snapshot.volume_id.as_deref().unwrap_or(""),
        ])
    }

    /// Labels for an exporter self-metric
    pub fn subsystem(subsystem: crate::Subsystem) -> Self {
        Self::new([subsystem.as_str()])
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Borrowed values, in the shape the prometheus vectors expect
    pub fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(","))
    }
}
