//! Configuration loading from files and the environment.

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use gateway_telemetry::LogFormat;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use validator::Validate;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Load configuration from the process environment.
///
/// Reads the file named by `GATEWAY_CONFIG` when set, applies environment
/// overrides and validates the result. Non-fatal findings are left to
/// [`GatewayConfig::log_warnings`] so they can be logged once logging is up.
///
/// # Errors
/// Returns error if the file cannot be read or parsed, an override is
/// malformed, or validation fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => read_file(Path::new(&path)).await?,
        _ => {
            debug!("No config file set, starting from defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    finish(config)
}

/// Load configuration from `path` without consulting the environment.
///
/// # Errors
/// Returns error if the file cannot be read or parsed, or validation fails
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let config = read_file(path.as_ref()).await?;
    finish(config)
}

/// Parse configuration text in the given format. Missing fields take their
/// defaults; no validation is performed.
///
/// # Errors
/// Returns `Parse` if the text is malformed
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        }),
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        }),
    }
}

async fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), format = ?format, "Loading configuration file");
    parse_config(&contents, format)
}

fn finish(config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    config.validate()?;
    Ok(config)
}

/// Apply `GATEWAY_*` overrides (and `OLLAMA_URL`) read through `lookup`.
///
/// # Errors
/// Returns `InvalidEnv` if a value cannot be parsed
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    if let Some(v) = env.string("GATEWAY_HOST") {
        config.server.host = v;
    }
    env.parse_into("GATEWAY_PORT", &mut config.server.port)?;

    if let Some(v) = env.string("OLLAMA_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = env.string("GATEWAY_UPSTREAM_URL") {
        config.upstream.base_url = v;
    }
    env.parse_into("GATEWAY_UPSTREAM_TIMEOUT_SECONDS", &mut config.upstream.timeout_seconds)?;
    env.parse_into("GATEWAY_MAX_RETRIES", &mut config.upstream.max_retries)?;
    env.parse_into("GATEWAY_BACKOFF_MIN_SECONDS", &mut config.upstream.backoff_min_seconds)?;
    env.parse_into("GATEWAY_BACKOFF_MAX_SECONDS", &mut config.upstream.backoff_max_seconds)?;
    if let Some(v) = env.string("GATEWAY_DEFAULT_MODEL") {
        config.upstream.default_model = v;
    }

    env.parse_into("GATEWAY_RATE_LIMIT_ENABLED", &mut config.admission.enabled)?;
    env.parse_into(
        "GATEWAY_GLOBAL_REQUESTS_PER_MINUTE",
        &mut config.admission.global_requests_per_minute,
    )?;
    env.parse_into(
        "GATEWAY_PER_CLIENT_REQUESTS_PER_MINUTE",
        &mut config.admission.per_client_requests_per_minute,
    )?;
    env.parse_into(
        "GATEWAY_UPSTREAM_BASE_REQUESTS_PER_MINUTE",
        &mut config.admission.upstream_base_requests_per_minute,
    )?;

    env.parse_into(
        "GATEWAY_CIRCUIT_BREAKER_THRESHOLD",
        &mut config.resilience.circuit_breaker_threshold,
    )?;
    env.parse_into(
        "GATEWAY_CIRCUIT_BREAKER_RESET_TIMEOUT_SECONDS",
        &mut config.resilience.circuit_breaker_reset_timeout_seconds,
    )?;
    env.parse_into(
        "GATEWAY_MODEL_CACHE_TTL_SECONDS",
        &mut config.catalog.model_cache_ttl_seconds,
    )?;

    if let Some(v) = env.string("GATEWAY_LOG_LEVEL") {
        config.logging.level = v.to_ascii_lowercase();
    }
    if let Some(v) = env.string("GATEWAY_LOG_FORMAT") {
        config.logging.format = match v.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    key: "GATEWAY_LOG_FORMAT".to_string(),
                    value: v,
                })
            }
        };
    }

    Ok(())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_into<T: FromStr>(&self, key: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(raw) = self.string(key) {
            *target = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw.clone(),
            })?;
            debug!(key = key, "Applied environment override");
        }
        Ok(())
    }
}
