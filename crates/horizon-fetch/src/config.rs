//! Data source configuration.
//!
//! Settings can be built in code or loaded from TOML:
//!
//! ```
//! use horizon_fetch::DataSourceConfig;
//!
//! let config = DataSourceConfig::from_toml_str(r#"
//! name = "contacts"
//! log_batches = true
//! "#).unwrap();
//!
//! assert_eq!(config.name, "contacts");
//! assert!(config.log_batches);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`ResultSetDataSource`](crate::ResultSetDataSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Label attached to every log line the data source emits.
    pub name: String,
    /// Log each published batch's events at debug level.
    pub log_batches: bool,
    /// Verify that notifications and reads stay on the constructing thread.
    pub check_thread_affinity: bool,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            name: "results".to_string(),
            log_batches: false,
            check_thread_affinity: cfg!(debug_assertions),
        }
    }
}

impl DataSourceConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Enables or disables per-batch logging.
    pub fn with_log_batches(mut self, enabled: bool) -> Self {
        self.log_batches = enabled;
        self
    }

    /// Enables or disables thread affinity checks.
    pub fn with_thread_affinity_checks(mut self, enabled: bool) -> Self {
        self.check_thread_affinity = enabled;
        self
    }

    /// Parses a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DataSourceConfig::default();
        assert_eq!(config.name, "results");
        assert!(!config.log_batches);
        assert_eq!(config.check_thread_affinity, cfg!(debug_assertions));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = DataSourceConfig::from_toml_str("log_batches = true").unwrap();
        assert_eq!(config.name, "results");
        assert!(config.log_batches);
    }

    #[test]
    fn test_invalid_toml() {
        let err = DataSourceConfig::from_toml_str("log_batches = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"inbox\"\ncheck_thread_affinity = false").unwrap();

        let config = DataSourceConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "inbox");
        assert!(!config.check_thread_affinity);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataSourceConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_builder() {
        let config = DataSourceConfig::named("feed")
            .with_log_batches(true)
            .with_thread_affinity_checks(false);
        assert_eq!(config.name, "feed");
        assert!(config.log_batches);
        assert!(!config.check_thread_affinity);
    }
}
