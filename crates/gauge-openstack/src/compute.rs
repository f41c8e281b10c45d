//! Nova limits

use crate::client::ServiceClient;
use async_trait::async_trait;
use gauge_core::{ComputePort, Quota, ResourceKind, Result, TenantContext};
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
    max_total_instances: i64,
    total_instances_used: i64,
    max_total_cores: i64,
    total_cores_used: i64,
    #[serde(rename = "maxTotalRAMSize")]
    max_total_ram_size: i64,
    #[serde(rename = "totalRAMUsed")]
    total_ram_used: i64,
}

/// Compute port backed by the Nova API
#[derive(Debug, Clone)]
pub struct ComputeClient {
    client: ServiceClient,
}

impl ComputeClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputePort for ComputeClient {
    async fn compute_limits(&self, tenant: &TenantContext) -> Result<Vec<Quota>> {
        let response: LimitsResponse = self.client.get_json("limits").await?;
        let absolute = response.limits.absolute;
        debug!("Compute limits for {}: {:?}", tenant, absolute);

        Ok(vec![
            Quota::new(
                ResourceKind::Instances,
                absolute.max_total_instances,
                absolute.total_instances_used,
            ),
            Quota::new(ResourceKind::Cores, absolute.max_total_cores, absolute.total_cores_used),
            Quota::new(ResourceKind::Ram, absolute.max_total_ram_size, absolute.total_ram_used),
        ])
    }
}
