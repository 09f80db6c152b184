//! Error types for the analyzer features

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("The fapolicyd service is not installed")]
    NotInstalled,

    #[error("Service error: {0}")]
    Service(String),

    #[error("Store error: {0}")]
    Store(#[from] libredux::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] libredux::ReduxError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read config file: {0}")]
    ReadConfig(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),
}

impl FeatureError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FeatureError::InvalidInput(_) => 3,
            FeatureError::NotInstalled => 2,
            FeatureError::Service(_) => 1,
            FeatureError::Store(_) => 1,
            FeatureError::Config(_) => 1,
            FeatureError::ReadConfig(_) => 1,
            FeatureError::ParseConfig(_) => 1,
        }
    }
}
