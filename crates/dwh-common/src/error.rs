//! Error types shared by the DWH crates

use thiserror::Error;

/// Result type alias for configuration and shared operations
pub type Result<T> = std::result::Result<T, DwhError>;

/// Errors raised before any remote call is made
#[derive(Error, Debug)]
pub enum DwhError {
    #[error("Missing configuration value '{key}' in section [{section}]. Add it to the config file or set DWH_{section}__{key}.")]
    ConfigurationMissing { section: String, key: String },

    #[error("Invalid configuration value '{key}' in section [{section}]: {message}")]
    InvalidConfiguration {
        section: String,
        key: String,
        message: String,
    },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DwhError {
    pub fn missing(section: &str, key: &str) -> Self {
        Self::ConfigurationMissing {
            section: section.to_uppercase(),
            key: key.to_uppercase(),
        }
    }

    pub fn invalid(section: &str, key: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            section: section.to_uppercase(),
            key: key.to_uppercase(),
            message: message.into(),
        }
    }
}
