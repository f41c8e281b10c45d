//! Octavia quota and load balancer listing

use crate::client::ServiceClient;
use async_trait::async_trait;
use gauge_core::{Error, LoadBalancerPort, Result, TenantContext};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    quota: LoadBalancerQuota,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerQuota {
    // Older Octavia releases only return the unseparated spelling.
    #[serde(default, alias = "loadbalancer")]
    load_balancer: Option<i64>,
}

/// Load balancer port backed by the Octavia v2 API
#[derive(Debug, Clone)]
pub struct LoadBalancerClient {
    client: ServiceClient,
}

impl LoadBalancerClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoadBalancerPort for LoadBalancerClient {
    async fn load_balancer_quota(&self, tenant: &TenantContext) -> Result<i64> {
        let path = format!("v2/lbaas/quotas/{}", tenant.id());
        let response: QuotaResponse = self.client.get_json(&path).await?;

        response
            .quota
            .load_balancer
            .ok_or_else(|| Error::decode(format!("No load_balancer quota for {}", tenant)))
    }

    async fn list_load_balancers(&self, tenant: &TenantContext) -> Result<usize> {
        let path = format!("v2/lbaas/loadbalancers?project_id={}", tenant.id());
        let load_balancers: Vec<IgnoredAny> =
            self.client.get_paginated(&path, "loadbalancers").await?;

        debug!("Counted {} load balancers for {}", load_balancers.len(), tenant);
        Ok(load_balancers.len())
    }
}
