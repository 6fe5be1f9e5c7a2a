//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, ParleyConfig, StorageBackend};

/// Checks cross-field constraints the schema cannot express.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }

    if config.storage.backend == StorageBackend::File && config.storage.path.as_os_str().is_empty()
    {
        return Err(ConfigError::validation(
            "storage.backend = \"file\" requires a non-empty storage.path",
        ));
    }

    if config.dispatch.timeout_secs == Some(0) {
        return Err(ConfigError::validation(
            "dispatch.timeout_secs must be greater than zero",
        ));
    }

    Ok(())
}
