use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Concurrency limits and chunk/flush intervals are non-zero
/// - External service URLs are present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.fetcher.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.concurrency cannot be 0".to_string(),
        ));
    }
    if config.fetcher.chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.chunk_size cannot be 0".to_string(),
        ));
    }
    if config.classifier.workers == 0 || config.validator.workers == 0 {
        return Err(ConfigError::ValidationError(
            "classifier.workers and validator.workers cannot be 0".to_string(),
        ));
    }
    if config.validator.flush_every == 0 {
        return Err(ConfigError::ValidationError(
            "validator.flush_every cannot be 0".to_string(),
        ));
    }
    if config.classifier.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "classifier.url cannot be empty".to_string(),
        ));
    }
    if config.validator.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "validator.url cannot be empty".to_string(),
        ));
    }
    if config.pipeline.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
