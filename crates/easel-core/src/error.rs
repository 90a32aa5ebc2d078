//! Error types for configuration loading

use easel_common::EaselError;
use thiserror::Error;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for EaselError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => EaselError::Io(e),
            other => EaselError::Config {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
