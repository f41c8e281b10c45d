//! Core type definitions for stackgauge

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tenant (OpenStack project) whose resources are being measured
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    /// Project identifier, published as the `tenant_id` label
    pub tenant_id: String,

    /// Human readable project name, if known
    pub name: Option<String>,
}

impl TenantContext {
    /// Create a new TenantContext from a project id
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Get the project id
    pub fn id(&self) -> &str {
        &self.tenant_id
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.tenant_id, name),
            None => write!(f, "{}", self.tenant_id),
        }
    }
}

/// Countable resource kinds that carry a quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instances,
    Cores,
    Ram,
    Volumes,
    Snapshots,
    VolumeGigabytes,
    LoadBalancers,
    FloatingIps,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Instances,
        ResourceKind::Cores,
        ResourceKind::Ram,
        ResourceKind::Volumes,
        ResourceKind::Snapshots,
        ResourceKind::VolumeGigabytes,
        ResourceKind::LoadBalancers,
        ResourceKind::FloatingIps,
    ];

    /// Name of the gauge carrying the limit for this kind
    pub fn max_metric(&self) -> &'static str {
        match self {
            ResourceKind::Instances => "openstack_max_total_instances",
            ResourceKind::Cores => "openstack_max_total_cores",
            ResourceKind::Ram => "openstack_max_total_ram",
            ResourceKind::Volumes => "openstack_max_total_volumes",
            ResourceKind::Snapshots => "openstack_max_total_snapshots",
            ResourceKind::VolumeGigabytes => "openstack_max_total_volume_gigabytes",
            ResourceKind::LoadBalancers => "openstack_max_loadbalancers",
            ResourceKind::FloatingIps => "openstack_max_floatingips",
        }
    }

    /// Name of the gauge carrying current usage for this kind
    pub fn used_metric(&self) -> &'static str {
        match self {
            ResourceKind::Instances => "openstack_total_instances_used",
            ResourceKind::Cores => "openstack_total_cores_used",
            ResourceKind::Ram => "openstack_total_ram_used",
            ResourceKind::Volumes => "openstack_total_volumes_used",
            ResourceKind::Snapshots => "openstack_total_snapshots_used",
            ResourceKind::VolumeGigabytes => "openstack_total_volume_gigabytes_used",
            ResourceKind::LoadBalancers => "openstack_total_loadbalancers_used",
            ResourceKind::FloatingIps => "openstack_total_floatingips_used",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instances => "instances",
            ResourceKind::Cores => "cores",
            ResourceKind::Ram => "ram",
            ResourceKind::Volumes => "volumes",
            ResourceKind::Snapshots => "snapshots",
            ResourceKind::VolumeGigabytes => "volume_gigabytes",
            ResourceKind::LoadBalancers => "loadbalancers",
            ResourceKind::FloatingIps => "floatingips",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend-declared maximum and current usage for one resource kind.
///
/// Either side may be missing when the backend only answered part of the
/// question; missing sides are never published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub kind: ResourceKind,
    pub max: Option<i64>,
    pub used: Option<i64>,
}

impl Quota {
    pub fn new(kind: ResourceKind, max: i64, used: i64) -> Self {
        Self {
            kind,
            max: Some(max),
            used: Some(used),
        }
    }

    pub fn max_only(kind: ResourceKind, max: i64) -> Self {
        Self {
            kind,
            max: Some(max),
            used: None,
        }
    }
}

/// One concrete volume or snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    pub name: String,

    /// Size in GiB
    pub size: i64,

    /// Raw lifecycle status as reported by the backend
    pub status: String,

    /// Owning volume, set for snapshots only
    pub volume_id: Option<String>,
}

impl ResourceInstance {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        size: i64,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            status: status.into(),
            volume_id: None,
        }
    }

    pub fn with_volume_id(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = Some(volume_id.into());
        self
    }
}

/// The independent units of one collection pass, in collection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    ComputeLimits,
    StorageLimits,
    LoadBalancer,
    NetworkLimits,
    Volumes,
    Snapshots,
}

impl Subsystem {
    pub const ALL: [Subsystem; 6] = [
        Subsystem::ComputeLimits,
        Subsystem::StorageLimits,
        Subsystem::LoadBalancer,
        Subsystem::NetworkLimits,
        Subsystem::Volumes,
        Subsystem::Snapshots,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::ComputeLimits => "compute_limits",
            Subsystem::StorageLimits => "storage_limits",
            Subsystem::LoadBalancer => "load_balancer",
            Subsystem::NetworkLimits => "network_limits",
            Subsystem::Volumes => "volumes",
            Subsystem::Snapshots => "snapshots",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
