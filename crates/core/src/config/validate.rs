use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one task can be admitted
/// - Output and temp directories are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.task.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "task.max_concurrent must be at least 1".to_string(),
        ));
    }

    if config.archive.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "archive.output_dir cannot be empty".to_string(),
        ));
    }

    if config.archive.temp_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "archive.temp_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
