//! Statement execution configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_ERROR_COUNT, DEFAULT_MAX_LONG_DATA_SIZE, DEFAULT_MAX_PREPARED_STATEMENTS,
};

/// Per-session statement execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementConfig {
    /// Maximum number of prepared statements a session may hold.
    #[serde(default = "default_max_prepared_statements")]
    pub max_prepared_statements: usize,

    /// Maximum bytes accumulated per parameter through long data.
    #[serde(default = "default_max_long_data_size")]
    pub max_long_data_size: usize,

    /// Maximum number of conditions stored per diagnostics area.
    #[serde(default = "default_max_error_count")]
    pub max_error_count: usize,

    /// Compile statements for the secondary engine first.
    #[serde(default)]
    pub secondary_engine: bool,
}

fn default_max_prepared_statements() -> usize {
    DEFAULT_MAX_PREPARED_STATEMENTS
}

fn default_max_long_data_size() -> usize {
    DEFAULT_MAX_LONG_DATA_SIZE
}

fn default_max_error_count() -> usize {
    DEFAULT_MAX_ERROR_COUNT
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            max_prepared_statements: default_max_prepared_statements(),
            max_long_data_size: default_max_long_data_size(),
            max_error_count: default_max_error_count(),
            secondary_engine: false,
        }
    }
}

impl StatementConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Creates a builder for configuration.
    pub fn builder() -> StatementConfigBuilder {
        StatementConfigBuilder::new()
    }
}

/// Builder for [`StatementConfig`].
#[derive(Default)]
pub struct StatementConfigBuilder {
    config: StatementConfig,
}

impl StatementConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prepared statement limit.
    pub fn max_prepared_statements(mut self, max: usize) -> Self {
        self.config.max_prepared_statements = max;
        self
    }

    /// Sets the long data size cap.
    pub fn max_long_data_size(mut self, max: usize) -> Self {
        self.config.max_long_data_size = max;
        self
    }

    /// Sets the diagnostics area capacity.
    pub fn max_error_count(mut self, max: usize) -> Self {
        self.config.max_error_count = max;
        self
    }

    /// Enables compiling for the secondary engine first.
    pub fn secondary_engine(mut self, enabled: bool) -> Self {
        self.config.secondary_engine = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StatementConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StatementConfig::default();
        assert_eq!(config.max_prepared_statements, 16_382);
        assert_eq!(config.max_long_data_size, 64 * 1024 * 1024);
        assert_eq!(config.max_error_count, 1024);
        assert!(!config.secondary_engine);
    }

    #[test]
    fn test_builder() {
        let config = StatementConfig::builder()
            .max_prepared_statements(4)
            .max_long_data_size(1024)
            .max_error_count(8)
            .secondary_engine(true)
            .build();

        assert_eq!(config.max_prepared_statements, 4);
        assert_eq!(config.max_long_data_size, 1024);
        assert_eq!(config.max_error_count, 8);
        assert!(config.secondary_engine);
    }

    #[test]
    fn test_to_toml() {
        let toml = StatementConfig::default().to_toml().unwrap();
        assert!(toml.contains("max_prepared_statements"));
        assert!(toml.contains("secondary_engine"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: StatementConfig = toml::from_str("max_error_count = 10\n").unwrap();
        assert_eq!(config.max_error_count, 10);
        assert_eq!(config.max_prepared_statements, 16_382);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("statement.toml");

        let config = StatementConfig::builder()
            .max_prepared_statements(32)
            .secondary_engine(true)
            .build();
        config.save(&path).unwrap();

        let loaded = StatementConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = StatementConfig::from_file(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
