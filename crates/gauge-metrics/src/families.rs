//! The published gauge families
//!
//! Names and label schemas are part of the exporter's compatibility surface;
//! dashboards and alerts key on them.

use gauge_core::labels::{SNAPSHOT_LABELS, SUBSYSTEM_LABELS, TENANT_LABELS, VOLUME_LABELS};
use serde::Serialize;

pub const VOLUME_SIZE: &str = "openstack_volume_size";
pub const VOLUME_STATUS: &str = "openstack_volume_status";
pub const SNAPSHOT_SIZE: &str = "openstack_snapshot_size";
pub const SNAPSHOT_STATUS: &str = "openstack_snapshot_status";
pub const SUBSYSTEM_UP: &str = "openstack_exporter_subsystem_up";
pub const SUBSYSTEM_DURATION: &str = "openstack_exporter_subsystem_duration_seconds";

/// Static definition of one gauge family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySpec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl FamilySpec {
    const fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self { name, help, labels }
    }

    pub fn descriptor(&self) -> MetricDescriptor {
        MetricDescriptor {
            name: self.name.to_string(),
            help: self.help.to_string(),
            labels: self.labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Owned description of a family, as returned by `describe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub labels: Vec<String>,
}

/// Every family the exporter publishes
pub const FAMILIES: &[FamilySpec] = &[
    FamilySpec::new(
        "openstack_max_total_instances",
        "Maximum total instances allowed in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_instances_used",
        "Total instances currently in use in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_total_cores",
        "Maximum total CPU cores allowed in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_cores_used",
        "Total CPU cores currently in use in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_total_ram",
        "Maximum total RAM size allowed in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_ram_used",
        "Total RAM currently in use in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_total_volumes",
        "Maximum total volumes allowed in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_volumes_used",
        "Total volumes currently in use in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_total_snapshots",
        "Maximum total snapshots allowed in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_snapshots_used",
        "Total snapshots currently in use in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_total_volume_gigabytes",
        "Maximum total volume gigabytes allowed in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_volume_gigabytes_used",
        "Total volume gigabytes currently in use in OpenStack storage",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_loadbalancers",
        "Maximum load balancers allowed in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_loadbalancers_used",
        "Total load balancers currently in use in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_max_floatingips",
        "Maximum floating IPs allowed in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        "openstack_total_floatingips_used",
        "Total floating IPs currently in use in OpenStack",
        TENANT_LABELS,
    ),
    FamilySpec::new(
        VOLUME_SIZE,
        "Size of volumes in OpenStack, identified by tenant ID, volume ID, and volume name",
        VOLUME_LABELS,
    ),
    FamilySpec::new(
        VOLUME_STATUS,
        "Status of volumes in OpenStack, identified by tenant ID, volume ID, and volume name",
        VOLUME_LABELS,
    ),
    FamilySpec::new(
        SNAPSHOT_SIZE,
        "Size of snapshots in OpenStack, identified by tenant ID, snapshot ID, snapshot name, and volume ID",
        SNAPSHOT_LABELS,
    ),
    FamilySpec::new(
        SNAPSHOT_STATUS,
        "Status of snapshots in OpenStack, identified by tenant ID, snapshot ID, snapshot name, and volume ID",
        SNAPSHOT_LABELS,
    ),
    FamilySpec::new(
        SUBSYSTEM_UP,
        "Whether the last query of an OpenStack subsystem succeeded (1) or failed (0)",
        SUBSYSTEM_LABELS,
    ),
    FamilySpec::new(
        SUBSYSTEM_DURATION,
        "Duration of the last query of an OpenStack subsystem in seconds",
        SUBSYSTEM_LABELS,
    ),
];
