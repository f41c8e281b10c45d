//! # gauge-openstack
//!
//! OpenStack REST implementations of the stackgauge subsystem ports.
//!
//! This crate provides:
//! - Keystone v3 password and application credential authentication
//! - An auth session that re-authenticates once when a token expires
//! - Service catalog endpoint selection and clouds.yaml resolution
//! - Nova, Cinder, Octavia and Neutron clients implementing the port traits

pub mod auth;
pub mod block_storage;
pub mod catalog;
pub mod client;
pub mod clouds;
pub mod compute;
pub mod identity;
pub mod load_balancer;
pub mod network;

// Re-export commonly used types
pub use auth::{AuthSession, AuthToken, Authenticator, Credential};
pub use block_storage::BlockStorageClient;
pub use catalog::{ServiceCatalog, ServiceType};
pub use client::ServiceClient;
pub use clouds::{CloudEntry, ResolvedCloud};
pub use compute::ComputeClient;
pub use identity::KeystoneAuthenticator;
pub use load_balancer::LoadBalancerClient;
pub use network::NetworkClient;

use gauge_core::{Error, OpenStackConfig, Result, SubsystemPorts, TenantContext};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// An authenticated connection to one tenant's services
#[derive(Debug, Clone)]
pub struct CloudConnection {
    pub tenant: TenantContext,
    pub ports: SubsystemPorts,
    pub session: Arc<AuthSession>,
}

/// Resolve credentials, authenticate and build a client for every subsystem
pub async fn connect(config: &OpenStackConfig, timeout: Duration) -> Result<CloudConnection> {
    let cloud = clouds::resolve(config)?;
    let http = build_http_client(&cloud, timeout)?;

    let authenticator = Arc::new(KeystoneAuthenticator::new(http.clone(), cloud.auth.clone())?);
    let (session, token) = AuthSession::login(authenticator).await?;
    let session = Arc::new(session);

    let tenant_id = cloud
        .auth
        .project_id
        .clone()
        .or_else(|| token.project_id.clone())
        .ok_or_else(|| Error::config("Token is not project scoped: set project_id or project_name"))?;
    let mut tenant = TenantContext::new(tenant_id);
    if let Some(name) = token.project_name.clone().or_else(|| cloud.auth.project_name.clone()) {
        tenant = tenant.with_name(name);
    }

    let overrides = &config.endpoint_overrides;
    let region = cloud.region_name.as_deref();
    let endpoint = |service: ServiceType, configured: &Option<String>| -> Result<String> {
        match configured {
            Some(url) => Ok(url.clone()),
            None => token.catalog.endpoint_for(service, &cloud.interface, region),
        }
    };

    let client = |service: ServiceType, configured: &Option<String>| -> Result<ServiceClient> {
        let url = endpoint(service, configured)?;
        info!("Using {} endpoint {}", service, url);
        ServiceClient::new(http.clone(), session.clone(), service, &url)
    };

    let ports = SubsystemPorts {
        compute: Arc::new(ComputeClient::new(client(ServiceType::Compute, &overrides.compute)?)),
        block_storage: Arc::new(BlockStorageClient::new(client(
            ServiceType::BlockStorage,
            &overrides.block_storage,
        )?)),
        load_balancer: Arc::new(LoadBalancerClient::new(client(
            ServiceType::LoadBalancer,
            &overrides.load_balancer,
        )?)),
        network: Arc::new(NetworkClient::new(client(ServiceType::Network, &overrides.network)?)),
    };

    info!("Connected to OpenStack as tenant {}", tenant);
    Ok(CloudConnection {
        tenant,
        ports,
        session,
    })
}

fn build_http_client(cloud: &ResolvedCloud, timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(cloud.insecure);

    if let Some(ref path) = cloud.cacert {
        let pem = std::fs::read(path)?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| Error::config(format!("Invalid CA bundle {}: {}", path.display(), e)))?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))
}
