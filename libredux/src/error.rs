//! Error types for libredux

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReduxError>;

#[derive(Error, Debug)]
pub enum ReduxError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store has been completed")]
    Completed,

    #[error("No async runtime available to run epics of feature '{0}'")]
    NoRuntime(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting_completed() {
        let error = ReduxError::Store(StoreError::Completed);
        assert_eq!(format!("{}", error), "Store error: Store has been completed");
    }

    #[test]
    fn test_error_message_formatting_no_runtime() {
        let error = StoreError::NoRuntime("daemon".to_string());
        assert_eq!(
            format!("{}", error),
            "No async runtime available to run epics of feature 'daemon'"
        );
    }

    #[test]
    fn test_error_message_formatting_config() {
        let config_error = ConfigError::InvalidValue("store.action_backlog_warning must be > 0".to_string());
        let error = ReduxError::Config(config_error);
        assert_eq!(
            format!("{}", error),
            "Configuration error: Invalid value: store.action_backlog_warning must be > 0"
        );
    }

    #[test]
    fn test_error_conversion_from_store_error() {
        let error: ReduxError = StoreError::Completed.into();
        match error {
            ReduxError::Store(StoreError::Completed) => {}
            _ => panic!("Expected ReduxError::Store"),
        }
    }

    #[test]
    fn test_error_conversion_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: ReduxError = ConfigError::from(io_error).into();
        assert!(matches!(error, ReduxError::Config(ConfigError::ReadError(_))));
    }
}
