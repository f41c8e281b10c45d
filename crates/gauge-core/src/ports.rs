//! Port traits for the backends a collection pass queries
//!
//! Each OpenStack subsystem is reached through its own trait so the collector
//! can be exercised against in-memory implementations and so a failing
//! backend stays isolated from the others.

use crate::{Quota, ResourceInstance, Result, TenantContext};
use async_trait::async_trait;
use std::sync::Arc;

/// Compute (nova) limits
#[async_trait]
pub trait ComputePort: Send + Sync {
    /// Instance, core and RAM quotas for the tenant
    async fn compute_limits(&self, tenant: &TenantContext) -> Result<Vec<Quota>>;
}

/// Block storage (cinder) limits and inventory
#[async_trait]
pub trait BlockStoragePort: Send + Sync {
    /// Volume, snapshot and gigabyte quotas for the tenant
    async fn storage_limits(&self, tenant: &TenantContext) -> Result<Vec<Quota>>;

    /// Every volume visible to the tenant
    async fn list_volumes(&self, tenant: &TenantContext) -> Result<Vec<ResourceInstance>>;

    /// Every snapshot visible to the tenant
    async fn list_snapshots(&self, tenant: &TenantContext) -> Result<Vec<ResourceInstance>>;
}

/// Load balancer (octavia) quota and inventory
#[async_trait]
pub trait LoadBalancerPort: Send + Sync {
    /// Maximum number of load balancers the tenant may create
    async fn load_balancer_quota(&self, tenant: &TenantContext) -> Result<i64>;

    /// Number of load balancers the tenant currently owns
    async fn list_load_balancers(&self, tenant: &TenantContext) -> Result<usize>;
}

/// Networking (neutron) quotas
#[async_trait]
pub trait NetworkPort: Send + Sync {
    /// Floating IP quota with current usage
    async fn network_quota(&self, tenant: &TenantContext) -> Result<Vec<Quota>>;
}

/// The full set of backends one collector talks to
#[derive(Clone)]
pub struct SubsystemPorts {
    pub compute: Arc<dyn ComputePort>,
    pub block_storage: Arc<dyn BlockStoragePort>,
    pub load_balancer: Arc<dyn LoadBalancerPort>,
    pub network: Arc<dyn NetworkPort>,
}

impl std::fmt::Debug for SubsystemPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemPorts").finish_non_exhaustive()
    }
}
