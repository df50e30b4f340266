//! Configuration loading for the sync daemon core: YAML + `${VAR}`
//! environment interpolation, validation, and the defaults spec §6
//! describes. Consumed, not owned, by the core -- this crate produces a
//! `SyncDaemonConfig` value and nothing else.

mod defaults;
mod env;
mod secret;
pub mod types;
mod validation;

use std::path::Path;

pub use defaults::{
    default_ignore_patterns, ERROR_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY, RESERVED_DIR,
    TRANSPORT_TIMEOUT,
};
pub use secret::Secret;
pub use types::{HumanDuration, ServerConfig, SyncDaemonConfig, SyncSettings, WatchConfig};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncDaemonConfig {
    /// Parse a configuration from a YAML string, interpolating `${VAR}`
    /// environment references before parsing.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: SyncDaemonConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a configuration from a file on disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
server:
  url: https://sync.example.com
  user_id: user-1
sync:
  local_folder: {}
  interval: 5m
  bidirectional: true
watch:
  enabled: true
  debounce: 500ms
"#,
            dir.path().display()
        );

        let config = SyncDaemonConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.server.url, "https://sync.example.com");
        assert_eq!(config.server.user_id, "user-1");
        assert!(config.watch.enabled);
        assert_eq!(config.ignore, default_ignore_patterns());
    }

    #[test]
    fn interpolates_env_vars_in_config() {
        std::env::set_var("SYNC_CONFIG_TEST_URL", "https://from-env.example.com");
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
server:
  url: ${{SYNC_CONFIG_TEST_URL}}
  user_id: user-1
sync:
  local_folder: {}
"#,
            dir.path().display()
        );

        let config = SyncDaemonConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.server.url, "https://from-env.example.com");
    }

    #[test]
    fn missing_env_var_is_reported() {
        let yaml = r#"
server:
  url: ${SYNC_CONFIG_DEFINITELY_MISSING}
  user_id: user-1
sync:
  local_folder: /tmp
"#;
        let result = SyncDaemonConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::MissingEnvVars(_))));
    }

    #[test]
    fn custom_ignore_list_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
server:
  url: https://sync.example.com
  user_id: user-1
sync:
  local_folder: {}
ignore:
  - "*.bak"
"#,
            dir.path().display()
        );

        let config = SyncDaemonConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.ignore, vec!["*.bak".to_string()]);
    }
}
