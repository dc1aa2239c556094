//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RelayConfig};
use relay_framework::Settings;

/// Validates the entire configuration.
pub fn validate_config(config: &RelayConfig) -> ConfigResult<()> {
    validate_bot_settings(&config.bot)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_settings(settings: &Settings) -> ConfigResult<()> {
    if settings.threadpool_num_workers == 0 {
        return Err(ConfigError::validation(
            "bot.threadpool_num_workers must be greater than 0",
        ));
    }

    for (name, section) in &settings.plugins {
        if !section.is_object() {
            return Err(ConfigError::validation(format!(
                "bot.plugins.{name} must be a table"
            )));
        }
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    Ok(())
}
