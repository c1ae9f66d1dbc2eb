//! Configuration loader with environment variable support

use super::{GatewayConfig, ProviderConfig};
use crate::error::{GatewayError, Result};
use config::{Environment, File};
use secrecy::Secret;
use std::path::Path;
use tracing::debug;

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_CHAT_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT";
pub const ENV_EMBEDDING_DEPLOYMENT: &str = "AZURE_OPENAI_EMBEDDING_DEPLOYMENT";
pub const ENV_REQUESTS_PER_MINUTE: &str = "AZURE_OPENAI_RPM";

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Load configuration from a TOML file with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(
            Environment::with_prefix("AI_GATEWAY")
                .separator("__")
                .try_parsing(true)
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Load configuration from `AZURE_OPENAI_*` variables, reading `.env` first if present
pub fn load_from_env() -> Result<GatewayConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary variable lookup
pub(crate) fn from_lookup<F>(lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| GatewayError::Configuration(format!("{} is required", key)))
    };

    let provider = ProviderConfig {
        endpoint: required(ENV_ENDPOINT)?,
        api_key: Secret::new(required(ENV_API_KEY)?),
        api_version: required(ENV_API_VERSION)?,
        chat_deployment: required(ENV_CHAT_DEPLOYMENT)?,
        embedding_deployment: required(ENV_EMBEDDING_DEPLOYMENT)?,
        timeout_secs: super::default_timeout(),
    };

    let mut config = GatewayConfig::new(provider);

    if let Some(raw) = lookup(ENV_REQUESTS_PER_MINUTE) {
        config.rate_limit.requests_per_minute = raw.trim().parse().map_err(|_| {
            GatewayError::Configuration(format!(
                "{} must be a positive integer, got '{}'",
                ENV_REQUESTS_PER_MINUTE, raw
            ))
        })?;
    }

    Ok(config)
}
