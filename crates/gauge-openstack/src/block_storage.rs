//! Cinder limits, volumes and snapshots

use crate::client::ServiceClient;
use async_trait::async_trait;
use gauge_core::{BlockStoragePort, Quota, ResourceInstance, ResourceKind, Result, TenantContext};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LimitsResponse {
    limits: Limits,
}

#[derive(Debug, Deserialize)]
struct Limits {
    absolute: AbsoluteLimits,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbsoluteLimits {
    max_total_volumes: i64,
    total_volumes_used: i64,
    max_total_snapshots: i64,
    total_snapshots_used: i64,
    max_total_volume_gigabytes: i64,
    total_gigabytes_used: i64,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(default)]
    name: Option<String>,
    size: i64,
    status: String,
}

impl From<Volume> for ResourceInstance {
    fn from(v: Volume) -> Self {
        ResourceInstance::new(v.id, v.name.unwrap_or_default(), v.size, v.status)
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    id: String,
    #[serde(default)]
    name: Option<String>,
    size: i64,
    status: String,
    #[serde(default)]
    volume_id: Option<String>,
}

impl From<Snapshot> for ResourceInstance {
    fn from(s: Snapshot) -> Self {
        let instance = ResourceInstance::new(s.id, s.name.unwrap_or_default(), s.size, s.status);
        match s.volume_id {
            Some(volume_id) => instance.with_volume_id(volume_id),
            None => instance,
        }
    }
}

/// Block storage port backed by the Cinder API
#[derive(Debug, Clone)]
pub struct BlockStorageClient {
    client: ServiceClient,
}

impl BlockStorageClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlockStoragePort for BlockStorageClient {
    async fn storage_limits(&self, tenant: &TenantContext) -> Result<Vec<Quota>> {
        let response: LimitsResponse = self.client.get_json("limits").await?;
        let absolute = response.limits.absolute;
        debug!("Block storage limits for {}: {:?}", tenant, absolute);

        Ok(vec![
            Quota::new(
                ResourceKind::Volumes,
                absolute.max_total_volumes,
                absolute.total_volumes_used,
            ),
            Quota::new(
                ResourceKind::Snapshots,
                absolute.max_total_snapshots,
                absolute.total_snapshots_used,
            ),
            Quota::new(
                ResourceKind::VolumeGigabytes,
                absolute.max_total_volume_gigabytes,
                absolute.total_gigabytes_used,
            ),
        ])
    }

    async fn list_volumes(&self, tenant: &TenantContext) -> Result<Vec<ResourceInstance>> {
        let volumes: Vec<Volume> = self.client.get_paginated("volumes/detail", "volumes").await?;
        debug!("Listed {} volumes for {}", volumes.len(), tenant);
        Ok(volumes.into_iter().map(ResourceInstance::from).collect())
    }

    async fn list_snapshots(&self, tenant: &TenantContext) -> Result<Vec<ResourceInstance>> {
        let snapshots: Vec<Snapshot> = self
            .client
            .get_paginated("snapshots/detail", "snapshots")
            .await?;
        debug!("Listed {} snapshots for {}", snapshots.len(), tenant);
        Ok(snapshots.into_iter().map(ResourceInstance::from).collect())
    }
}
