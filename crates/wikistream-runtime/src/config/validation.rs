//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ClientConfig, LogOutput, LoggingConfig, RetryConfig, WikiStreamConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &WikiStreamConfig) -> ConfigResult<()> {
    validate_client_config(&config.client)?;
    validate_retry_config(&config.reconnect)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates connection settings.
fn validate_client_config(client: &ClientConfig) -> ConfigResult<()> {
    if client.user_agent.trim().is_empty() {
        return Err(ConfigError::missing_field("client.user_agent"));
    }

    validate_url(&client.base_url)
}

/// Validates retry configuration.
fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

/// Validates logging configuration.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates a stream service URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("client.base_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = WikiStreamConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let mut config = WikiStreamConfig::default();
        config.client.user_agent = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut config = WikiStreamConfig::default();
        config.client.base_url = "ws://stream.example.org".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_retry_delays() {
        let mut config = WikiStreamConfig::default();
        config.reconnect.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = WikiStreamConfig::default();
        config.reconnect.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = WikiStreamConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("wikistream.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
