//! # Gateway Config
//!
//! Typed configuration for the inference admission gateway.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. the file named by `GATEWAY_CONFIG` (YAML or TOML)
//! 3. `GATEWAY_*` environment variables, plus `OLLAMA_URL`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    AdmissionSettings, CatalogSettings, GatewayConfig, LoggingSettings, ResilienceSettings,
    ServerSettings, UpstreamSettings,
};
pub use error::ConfigError;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, parse_config, ConfigFormat, CONFIG_PATH_ENV,
};
