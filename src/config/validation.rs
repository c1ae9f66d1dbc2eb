//! Configuration validation

use super::*;
use crate::error::{GatewayError, Result};

/// Validate complete configuration
pub fn validate_config(config: &GatewayConfig) -> Result<()> {
    validate_provider_config(&config.provider)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_embedding_config(&config.embedding)?;
    validate_chat_options(&config.chat)?;
    Ok(())
}

/// Validate provider connection settings
fn validate_provider_config(config: &ProviderConfig) -> Result<()> {
    if config.endpoint.is_empty() {
        return Err(GatewayError::Configuration(
            "Provider endpoint cannot be empty".to_string()
        ));
    }

    if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
        return Err(GatewayError::Configuration(
            "Provider endpoint must start with http:// or https://".to_string()
        ));
    }

    if config.api_key().is_empty() {
        return Err(GatewayError::Configuration(
            "Provider API key is required".to_string()
        ));
    }

    if config.api_version.trim().is_empty() {
        return Err(GatewayError::Configuration(
            "Provider API version is required".to_string()
        ));
    }

    if config.chat_deployment.trim().is_empty() {
        return Err(GatewayError::Configuration(
            "Chat deployment id is required".to_string()
        ));
    }

    if config.embedding_deployment.trim().is_empty() {
        return Err(GatewayError::Configuration(
            "Embedding deployment id is required".to_string()
        ));
    }

    if config.timeout_secs == 0 {
        return Err(GatewayError::Configuration(
            "Provider timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<()> {
    if config.requests_per_minute == 0 {
        return Err(GatewayError::Configuration(
            "Requests per minute must be greater than 0".to_string()
        ));
    }

    if config.window_secs == 0 {
        return Err(GatewayError::Configuration(
            "Rate limit window must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<()> {
    if config.max_retries == 0 {
        return Err(GatewayError::Configuration(
            "Max retries must be at least 1".to_string()
        ));
    }

    if config.max_retries > 10 {
        return Err(GatewayError::Configuration(
            "Max retries too large (max: 10)".to_string()
        ));
    }

    if let BackoffConfig::Exponential { max_delay_ms, .. } = config.backoff {
        if max_delay_ms < config.base_delay_ms {
            return Err(GatewayError::Configuration(
                "Exponential backoff max delay must be at least the base delay".to_string()
            ));
        }
    }

    Ok(())
}

/// Validate embedding configuration
fn validate_embedding_config(config: &EmbeddingConfig) -> Result<()> {
    if config.dimension == 0 {
        return Err(GatewayError::Configuration(
            "Embedding dimension must be greater than 0".to_string()
        ));
    }

    if config.batch_size == 0 {
        return Err(GatewayError::Configuration(
            "Embedding batch size must be greater than 0".to_string()
        ));
    }

    if config.chunk_size == 0 {
        return Err(GatewayError::Configuration(
            "Chunk size must be greater than 0".to_string()
        ));
    }

    if config.chunk_overlap >= config.chunk_size {
        return Err(GatewayError::Configuration(format!(
            "Chunk overlap ({}) must be smaller than chunk size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    if config.cache_enabled {
        if config.cache_size == 0 {
            return Err(GatewayError::Configuration(
                "Cache size must be greater than 0 when cache is enabled".to_string()
            ));
        }

        if config.cache_ttl_secs == 0 {
            return Err(GatewayError::Configuration(
                "Cache TTL must be greater than 0 when cache is enabled".to_string()
            ));
        }
    }

    Ok(())
}

/// Validate default generation parameters
fn validate_chat_options(options: &ChatCompletionOptions) -> Result<()> {
    if options.max_tokens == 0 {
        return Err(GatewayError::Configuration(
            "max_tokens must be greater than 0".to_string()
        ));
    }

    if !(0.0..=2.0).contains(&options.temperature) {
        return Err(GatewayError::Configuration(
            "temperature must be between 0.0 and 2.0".to_string()
        ));
    }

    if !(0.0..=1.0).contains(&options.top_p) {
        return Err(GatewayError::Configuration(
            "top_p must be between 0.0 and 1.0".to_string()
        ));
    }

    for (name, value) in [
        ("frequency_penalty", options.frequency_penalty),
        ("presence_penalty", options.presence_penalty),
    ] {
        if !(-2.0..=2.0).contains(&value) {
            return Err(GatewayError::Configuration(format!(
                "{} must be between -2.0 and 2.0",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        GatewayConfig::new(ProviderConfig {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_key: Secret::new("key".to_string()),
            api_version: "2024-02-01".to_string(),
            chat_deployment: "chat".to_string(),
            embedding_deployment: "embed".to_string(),
            timeout_secs: 30,
        })
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_api_key() {
        let mut config = valid_config();
        config.provider.api_key = Secret::new(String::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_endpoint_scheme() {
        let mut config = valid_config();
        config.provider.endpoint = "example.openai.azure.com".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = valid_config();
        config.embedding.chunk_size = 200;
        config.embedding.chunk_overlap = 200;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_rpm() {
        let mut config = valid_config();
        config.rate_limit.requests_per_minute = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = valid_config();
        config.chat.temperature = 2.5;
        assert!(validate_config(&config).is_err());
    }
}
