//! Configuration management for the exporter process

use gauge_core::config::load_layered;
use gauge_core::Config as CoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration for the exporter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// OpenStack, collector and server sections
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Show target in logs
    pub show_target: bool,

    /// Show thread IDs in logs
    pub show_thread_ids: bool,

    /// Show line numbers in logs
    pub show_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_line_numbers: false,
        }
    }
}

impl AgentConfig {
    /// Load defaults, then the config file, then `STACKGAUGE_*` environment variables
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        Ok(load_layered(&Self::default(), path)?)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| crate::AgentError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| crate::AgentError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.core
            .validate()
            .map_err(|e| crate::AgentError::Config(format!("Core config validation failed: {}", e)))?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::AgentError::Config(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            _ => {
                return Err(crate::AgentError::Config(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.core.server.bind_addr.port(), 9183);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_config_validation() {
        let mut config = AgentConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.core.collector.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("stackgauge.yaml");

        let mut config = AgentConfig::default();
        config.logging.format = "json".to_string();
        config.core.openstack.cloud = Some("prod".to_string());

        config.to_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = AgentConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_flattened_sections() {
        let yaml = config_yaml();
        let config: AgentConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.core.openstack.cloud.as_deref(), Some("prod"));
        assert_eq!(config.core.collector.timeout_seconds, 10);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.core.server.metrics_path, "/metrics");
    }

    #[test]
    fn test_layered_load() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(config_yaml().as_bytes()).unwrap();

        let config = AgentConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.core.openstack.cloud.as_deref(), Some("prod"));
        assert_eq!(config.core.collector.timeout_seconds, 10);
        assert!(config.core.collector.concurrent);
        assert_eq!(config.logging.level, "debug");
    }

    fn config_yaml() -> String {
        r#"
openstack:
  cloud: prod
collector:
  timeout_seconds: 10
logging:
  level: debug
"#
        .to_string()
    }
}
