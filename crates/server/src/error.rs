//! Errors raised while configuring or starting a server.
//!
//! All of these are fatal: a server that fails to build never serves.

use thiserror::Error;

use restkit_core::RegistryError;
use restkit_observability::LogError;

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid upload blocked pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Anything that stops a server from being built or served.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
