//! Configuration management for the store

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::logging::{LogFormat, LoggingConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub store: StoreSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSection {
    /// Queued actions at which a slow subscriber is reported. Subscribers
    /// never lose actions; this only controls the warning.
    pub action_backlog_warning: usize,
    /// Same threshold for state snapshots.
    pub state_backlog_warning: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            action_backlog_warning: 1024,
            state_backlog_warning: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub format: String,
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from the default location.
    ///
    /// A missing file at the default location yields the defaults; a path
    /// given through `REDUX_CONFIG` must exist.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("REDUX_CONFIG") {
            let path = PathBuf::from(shellexpand::tilde(&path).to_string());
            return Self::load_from_path(&path);
        }

        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: StoreConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.action_backlog_warning == 0 {
            return Err(ConfigError::InvalidValue("store.action_backlog_warning must be > 0".to_string()).into());
        }
        if self.store.state_backlog_warning == 0 {
            return Err(ConfigError::InvalidValue("store.state_backlog_warning must be > 0".to_string()).into());
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        self.logging
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::InvalidValue(e).into())
    }

    /// Logging settings derived from the `[logging]` section.
    pub fn logging_config(&self, verbose: bool) -> Result<LoggingConfig> {
        Ok(LoggingConfig::new(self.log_format()?, self.logging.level.clone(), verbose))
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::InvalidValue("no config directory on this platform".to_string()))?;

    Ok(config_dir.join("fapolicy-analyzer").join("store.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReduxError;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.store.action_backlog_warning, 1024);
        assert_eq!(config.store.state_backlog_warning, 256);
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let file = write_config("[store]\naction_backlog_warning = 64\n");
        let config = StoreConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.store.action_backlog_warning, 64);
        assert_eq!(config.store.state_backlog_warning, 256);
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn test_zero_backlog_warning_rejected() {
        let file = write_config("[store]\nstate_backlog_warning = 0\n");
        let result = StoreConfig::load_from_path(file.path());
        assert!(matches!(result, Err(ReduxError::Config(ConfigError::InvalidValue(_)))));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let file = write_config("[logging]\nformat = \"xml\"\n");
        let result = StoreConfig::load_from_path(file.path());
        assert!(matches!(result, Err(ReduxError::Config(ConfigError::InvalidValue(_)))));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[store\n");
        let result = StoreConfig::load_from_path(file.path());
        assert!(matches!(result, Err(ReduxError::Config(ConfigError::ParseError(_)))));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let file = write_config("[logging]\nformat = \"json\"\nlevel = \"debug\"\n");
        std::env::set_var("REDUX_CONFIG", file.path());
        let config = StoreConfig::load();
        std::env::remove_var("REDUX_CONFIG");

        let config = config.unwrap();
        assert_eq!(config.log_format().unwrap(), LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_missing_env_path_is_an_error() {
        std::env::set_var("REDUX_CONFIG", "/nonexistent/redux/store.toml");
        let result = StoreConfig::load();
        std::env::remove_var("REDUX_CONFIG");

        assert!(matches!(result, Err(ReduxError::Config(ConfigError::ReadError(_)))));
    }
}
