//! Configuration management for stackgauge
//!
//! Configuration is layered from defaults, an optional YAML file and
//! `STACKGAUGE_*` environment variables, in increasing order of precedence.

use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "STACKGAUGE_CONFIG";

/// Prefix for environment overrides, e.g. `STACKGAUGE_SERVER__BIND_ADDR`
pub const ENV_PREFIX: &str = "STACKGAUGE";

const DEFAULT_CONFIG_PATHS: &[&str] = &["./stackgauge.yaml", "/etc/stackgauge/config.yaml"];

/// Port the metrics endpoint listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 9183;

/// Main configuration structure for the exporter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cloud credentials and endpoint selection
    pub openstack: OpenStackConfig,

    /// Collection pass behaviour
    pub collector: CollectorConfig,

    /// Metrics listener
    pub server: ServerConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.openstack.validate()?;
        self.collector.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

/// Layer `defaults`, a YAML file and environment overrides into `T`.
///
/// An explicitly named file must exist; the well-known locations are optional.
pub fn load_layered<T>(defaults: &T, path: Option<&Path>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut builder = config::Config::builder().add_source(config::Config::try_from(defaults)?);

    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    match explicit {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }
        None => {
            for path in DEFAULT_CONFIG_PATHS {
                builder = builder.add_source(config::File::with_name(path).required(false));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}

/// Cloud credentials and endpoint selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenStackConfig {
    /// Entry to use from clouds.yaml; falls back to `OS_CLOUD`
    pub cloud: Option<String>,

    /// Explicit clouds.yaml location
    pub clouds_file: Option<PathBuf>,

    /// Inline credentials; take precedence over clouds.yaml
    pub auth: Option<AuthSettings>,

    /// Region used for catalog endpoint selection
    pub region_name: Option<String>,

    /// Catalog interface (public, internal, admin)
    pub interface: String,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Extra CA bundle (PEM)
    pub cacert: Option<PathBuf>,

    /// Per-service endpoints that bypass the catalog
    pub endpoint_overrides: EndpointOverrides,
}

impl OpenStackConfig {
    pub fn validate(&self) -> Result<()> {
        match self.interface.as_str() {
            "public" | "internal" | "admin" => {}
            other => {
                return Err(crate::Error::config(format!(
                    "Invalid endpoint interface: {}",
                    other
                )))
            }
        }

        if let Some(ref auth) = self.auth {
            auth.validate()?;
        }

        self.endpoint_overrides.validate()
    }
}

impl Default for OpenStackConfig {
    fn default() -> Self {
        Self {
            cloud: None,
            clouds_file: None,
            auth: None,
            region_name: None,
            interface: "public".to_string(),
            insecure: false,
            cacert: None,
            endpoint_overrides: EndpointOverrides::default(),
        }
    }
}

/// Keystone credentials, in the same shape as a clouds.yaml `auth` block
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,
}

impl AuthSettings {
    /// True when an application credential grant can be used
    pub fn uses_application_credential(&self) -> bool {
        self.application_credential_id.is_some() && self.application_credential_secret.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        match self.auth_url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(url) => {
                return Err(crate::Error::config(format!("Invalid auth_url: {}", url)));
            }
            None => return Err(crate::Error::config("auth_url is required")),
        }

        if self.uses_application_credential() {
            return Ok(());
        }

        if self.username.is_none() && self.user_id.is_none() {
            return Err(crate::Error::config(
                "username, user_id or an application credential is required",
            ));
        }

        if self.password.is_none() {
            return Err(crate::Error::config("password is required for password auth"));
        }

        Ok(())
    }

    /// Fill every unset field from `other`
    pub fn merge_missing(&mut self, other: &AuthSettings) {
        fn fill(slot: &mut Option<String>, from: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }

        fill(&mut self.auth_url, &other.auth_url);
        fill(&mut self.username, &other.username);
        fill(&mut self.user_id, &other.user_id);
        fill(&mut self.password, &other.password);
        fill(&mut self.user_domain_name, &other.user_domain_name);
        fill(&mut self.user_domain_id, &other.user_domain_id);
        fill(&mut self.project_id, &other.project_id);
        fill(&mut self.project_name, &other.project_name);
        fill(&mut self.project_domain_name, &other.project_domain_name);
        fill(&mut self.project_domain_id, &other.project_domain_id);
        fill(&mut self.domain_id, &other.domain_id);
        fill(&mut self.domain_name, &other.domain_name);
        fill(&mut self.application_credential_id, &other.application_credential_id);
        fill(
            &mut self.application_credential_secret,
            &other.application_credential_secret,
        );
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("user_domain_name", &self.user_domain_name)
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .field("application_credential_id", &self.application_credential_id)
            .field(
                "application_credential_secret",
                &self.application_credential_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Per-service endpoint overrides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub compute: Option<String>,
    pub block_storage: Option<String>,
    pub load_balancer: Option<String>,
    pub network: Option<String>,
}

impl EndpointOverrides {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("compute", &self.compute),
            ("block_storage", &self.block_storage),
            ("load_balancer", &self.load_balancer),
            ("network", &self.network),
        ];

        for (service, endpoint) in all {
            if let Some(endpoint) = endpoint {
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    return Err(crate::Error::config(format!(
                        "Invalid {} endpoint override: {}",
                        service, endpoint
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Collection pass configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Deadline for each subsystem query, in seconds
    pub timeout_seconds: u64,

    /// Query subsystems concurrently
    pub concurrent: bool,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(crate::Error::config("Collector timeout must be > 0"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            concurrent: true,
        }
    }
}

/// Metrics listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,

    /// Path serving the scrape
    pub metrics_path: String,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') || self.metrics_path.len() < 2 {
            return Err(crate::Error::config(format!(
                "Invalid metrics path: {}",
                self.metrics_path
            )));
        }

        if self.metrics_path == "/health" {
            return Err(crate::Error::config("Metrics path conflicts with /health"));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            metrics_path: "/metrics".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr.port(), 9183);
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.collector.timeout(), Duration::from_secs(30));
        assert_eq!(config.openstack.interface, "public");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.collector.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.collector.timeout_seconds = 10;

        config.openstack.interface = "private".to_string();
        assert!(config.validate().is_err());
        config.openstack.interface = "internal".to_string();

        config.server.metrics_path = "metrics".to_string();
        assert!(config.validate().is_err());
        config.server.metrics_path = "/health".to_string();
        assert!(config.validate().is_err());
        config.server.metrics_path = "/metrics".to_string();

        config.openstack.endpoint_overrides.network = Some("neutron:9696".to_string());
        assert!(config.validate().is_err());
        config.openstack.endpoint_overrides.network = Some("http://neutron:9696".to_string());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_validation() {
        let mut auth = AuthSettings {
            auth_url: Some("https://keystone.example.com:5000".to_string()),
            username: Some("exporter".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(auth.validate().is_ok());

        auth.password = None;
        assert!(auth.validate().is_err());

        auth.application_credential_id = Some("app".to_string());
        auth.application_credential_secret = Some("app-secret".to_string());
        assert!(auth.validate().is_ok());

        auth.auth_url = Some("keystone:5000".to_string());
        assert!(auth.validate().is_err());
    }

    #[test]
    fn test_auth_merge_and_redaction() {
        let mut inline = AuthSettings {
            password: Some("override".to_string()),
            ..Default::default()
        };
        let from_file = AuthSettings {
            auth_url: Some("https://keystone:5000/v3".to_string()),
            username: Some("exporter".to_string()),
            password: Some("from-file".to_string()),
            ..Default::default()
        };

        inline.merge_missing(&from_file);
        assert_eq!(inline.password.as_deref(), Some("override"));
        assert_eq!(inline.username.as_deref(), Some("exporter"));

        let debug = format!("{:?}", inline);
        assert!(!debug.contains("override"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "openstack:\n  cloud: prod\n  region_name: RegionOne\ncollector:\n  timeout_seconds: 5\nserver:\n  bind_addr: 127.0.0.1:9999"
        )
        .unwrap();

        let config: Config = load_layered(&Config::default(), Some(file.path())).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.openstack.cloud.as_deref(), Some("prod"));
        assert_eq!(config.openstack.region_name.as_deref(), Some("RegionOne"));
        assert_eq!(config.openstack.interface, "public");
        assert_eq!(config.collector.timeout_seconds, 5);
        assert!(config.collector.concurrent);
        assert_eq!(config.server.bind_addr.port(), 9999);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result: Result<Config> =
            load_layered(&Config::default(), Some(Path::new("/nonexistent/stackgauge.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, deserialized);
    }
}
