//! clouds.yaml lookup and credential resolution

use gauge_core::{AuthSettings, Error, ErrorContext, OpenStackConfig, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit clouds.yaml
pub const CLIENT_CONFIG_ENV: &str = "OS_CLIENT_CONFIG_FILE";

/// Environment variable naming the cloud entry to use
pub const CLOUD_ENV: &str = "OS_CLOUD";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: HashMap<String, CloudEntry>,
}

/// One entry under `clouds:`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudEntry {
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub verify: Option<bool>,
    #[serde(default)]
    pub cacert: Option<PathBuf>,
}

/// Everything needed to authenticate and select endpoints
#[derive(Debug, Clone)]
pub struct ResolvedCloud {
    pub auth: AuthSettings,
    pub region_name: Option<String>,
    pub interface: String,
    pub insecure: bool,
    pub cacert: Option<PathBuf>,
}

/// Candidate clouds.yaml locations, in lookup order
pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CLIENT_CONFIG_ENV) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("clouds.yaml"));
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/openstack/clouds.yaml"));
    }
    paths.push(PathBuf::from("/etc/openstack/clouds.yaml"));

    paths
}

/// Parse a clouds.yaml file
pub fn load_file(path: &Path) -> Result<CloudsFile> {
    let content = std::fs::read_to_string(path)
        .with_context_fn(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context_fn(|| format!("Failed to parse {}", path.display()))
}

/// Load the named cloud from the first clouds.yaml found
pub fn load_cloud(explicit: Option<&Path>, name: &str) -> Result<CloudEntry> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::config(format!(
                "clouds file not found: {}",
                path.display()
            )));
        }
    }

    let path = search_paths(explicit)
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| Error::config("No clouds.yaml found"))?;

    debug!("Reading cloud '{}' from {}", name, path.display());
    let mut file = load_file(&path)?;
    file.clouds
        .remove(name)
        .ok_or_else(|| Error::config(format!("Cloud '{}' not found in {}", name, path.display())))
}

/// Combine inline configuration with the clouds.yaml entry
///
/// Inline `auth` fields take precedence; missing ones are filled from the
/// cloud entry. A non-default `interface` in the exporter config wins over
/// the entry's.
pub fn resolve(config: &OpenStackConfig) -> Result<ResolvedCloud> {
    let cloud_name = config
        .cloud
        .clone()
        .or_else(|| std::env::var(CLOUD_ENV).ok().filter(|s| !s.is_empty()));

    let entry = match cloud_name {
        Some(ref name) => {
            let entry = load_cloud(config.clouds_file.as_deref(), name)?;
            info!("Using cloud '{}'", name);
            Some(entry)
        }
        None => None,
    };

    resolve_with(config, entry)
}

fn resolve_with(config: &OpenStackConfig, entry: Option<CloudEntry>) -> Result<ResolvedCloud> {
    let mut auth = match (&config.auth, &entry) {
        (Some(inline), _) => inline.clone(),
        (None, Some(entry)) => entry.auth.clone(),
        (None, None) => {
            return Err(Error::config(
                "No credentials: set openstack.auth or select a cloud from clouds.yaml",
            ))
        }
    };

    let entry = entry.unwrap_or_default();
    auth.merge_missing(&entry.auth);
    auth.validate()?;

    let interface = match (config.interface.as_str(), entry.interface) {
        ("public", Some(from_entry)) => from_entry,
        (configured, _) => configured.to_string(),
    };

    Ok(ResolvedCloud {
        auth,
        region_name: config.region_name.clone().or(entry.region_name),
        interface,
        insecure: config.insecure || entry.verify == Some(false),
        cacert: config.cacert.clone().or(entry.cacert),
    })
}
