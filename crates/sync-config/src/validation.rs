use crate::types::SyncDaemonConfig;
use crate::ConfigError;

impl SyncDaemonConfig {
    /// Validate fatal-startup constraints (spec §7): an empty server URL,
    /// an empty user id, or a local folder that does not exist are all
    /// rejected before the daemon is allowed to start.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.url.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "server.url must not be empty".to_string(),
            ));
        }

        if self.server.user_id.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "server.user_id must not be empty".to_string(),
            ));
        }

        if !self.sync.local_folder.is_absolute() {
            errors.push(ConfigError::InvalidConfig(format!(
                "sync.local_folder must be an absolute path, got {}",
                self.sync.local_folder.display()
            )));
        } else if !self.sync.local_folder.exists() {
            errors.push(ConfigError::InvalidConfig(format!(
                "sync.local_folder does not exist: {}",
                self.sync.local_folder.display()
            )));
        } else if !self.sync.local_folder.is_dir() {
            errors.push(ConfigError::InvalidConfig(format!(
                "sync.local_folder is not a directory: {}",
                self.sync.local_folder.display()
            )));
        }

        errors
    }

    /// Validate and return `Ok(())`, or the first error encountered.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into_iter().next().unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServerConfig, SyncSettings, WatchConfig};

    fn base_config(local_folder: std::path::PathBuf) -> SyncDaemonConfig {
        SyncDaemonConfig {
            server: ServerConfig {
                url: "https://sync.example.com".to_string(),
                api_key: None,
                user_id: "user-1".to_string(),
            },
            sync: SyncSettings {
                local_folder,
                interval: Default::default(),
                bidirectional: true,
            },
            watch: WatchConfig::default(),
            ignore: vec![],
        }
    }

    #[test]
    fn rejects_empty_server_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().to_path_buf());
        config.server.url = String::new();
        let errors = config.validate();
        assert!(!errors.is_empty());
    }

    #[test]
    fn rejects_empty_user_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path().to_path_buf());
        config.server.user_id = "   ".to_string();
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn rejects_nonexistent_local_folder() {
        let config = base_config(std::path::PathBuf::from("/nonexistent/path/for/sure"));
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn rejects_relative_local_folder() {
        let config = base_config(std::path::PathBuf::from("relative/path"));
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn accepts_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path().to_path_buf());
        assert!(config.validate().is_empty());
    }
}
