//! Neutron quota details

use crate::client::ServiceClient;
use async_trait::async_trait;
use gauge_core::{NetworkPort, Quota, ResourceKind, Result, TenantContext};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct QuotaDetailsResponse {
    quota: QuotaDetails,
}

#[derive(Debug, Deserialize)]
struct QuotaDetails {
    floatingip: QuotaDetail,
}

#[derive(Debug, Deserialize)]
struct QuotaDetail {
    limit: i64,
    used: i64,
}

/// Network port backed by the Neutron v2.0 API
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: ServiceClient,
}

impl NetworkClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkPort for NetworkClient {
    async fn network_quota(&self, tenant: &TenantContext) -> Result<Vec<Quota>> {
        let path = format!("v2.0/quotas/{}/details.json", tenant.id());
        let response: QuotaDetailsResponse = self.client.get_json(&path).await?;
        let floating = response.quota.floatingip;
        debug!("Floating IP quota for {}: {:?}", tenant, floating);

        Ok(vec![Quota::new(
            ResourceKind::FloatingIps,
            floating.limit,
            floating.used,
        )])
    }
}
