//! Service catalog returned with a Keystone token

use gauge_core::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// The four backends the exporter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Compute,
    BlockStorage,
    LoadBalancer,
    Network,
}

impl ServiceType {
    /// Catalog `type` values for this service, most preferred first
    pub fn catalog_types(&self) -> &'static [&'static str] {
        match self {
            ServiceType::Compute => &["compute"],
            ServiceType::BlockStorage => &["block-storage", "volumev3", "volumev2", "volume"],
            ServiceType::LoadBalancer => &["load-balancer"],
            ServiceType::Network => &["network"],
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceType::Compute => "compute",
            ServiceType::BlockStorage => "block-storage",
            ServiceType::LoadBalancer => "load-balancer",
            ServiceType::Network => "network",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

impl CatalogEndpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Find the endpoint URL for a service
    ///
    /// Without a region the first endpoint with a matching interface wins.
    pub fn endpoint_for(
        &self,
        service: ServiceType,
        interface: &str,
        region: Option<&str>,
    ) -> Result<String> {
        for service_type in service.catalog_types() {
            let found = self
                .entries
                .iter()
                .filter(|entry| entry.service_type == *service_type)
                .flat_map(|entry| entry.endpoints.iter())
                .find(|endpoint| {
                    endpoint.interface == interface
                        && region.map_or(true, |r| endpoint.in_region(r))
                });

            if let Some(endpoint) = found {
                return Ok(endpoint.url.trim_end_matches('/').to_string());
            }
        }

        Err(Error::endpoint_not_found(format!(
            "No {} endpoint for {} interface{}",
            service,
            interface,
            region.map(|r| format!(" in region {}", r)).unwrap_or_default()
        )))
    }
}
