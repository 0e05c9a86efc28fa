//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not a supported format
    #[error("Unsupported config format for {path}, expected .yaml, .yml or .toml")]
    UnsupportedFormat {
        /// File path
        path: PathBuf,
    },

    /// The file content could not be parsed
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parser message
        message: String,
    },

    /// An environment override could not be parsed
    #[error("Invalid value '{value}' for {key}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },

    /// Field-level validation failed
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}
