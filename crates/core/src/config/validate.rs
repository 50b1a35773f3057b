//! Configuration validation.
//!
//! Runs before any queue is constructed: a bad pattern or an impossible
//! setting must abort the whole run up front, never mid-batch.

use crate::engine::OutputFormat;
use crate::naming::FilenamePattern;

use super::{types::Config, ConfigError};

/// Validates a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.queue.max_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_jobs must be at least 1".to_string(),
        ));
    }

    FilenamePattern::parse(&config.naming.basename_pattern)
        .map_err(|e| ConfigError::ValidationError(format!("naming.basename_pattern: {e}")))?;

    if let Some(pattern) = &config.naming.subfolder_pattern {
        FilenamePattern::parse(pattern)
            .map_err(|e| ConfigError::ValidationError(format!("naming.subfolder_pattern: {e}")))?;

        if config.naming.into_folder.is_none() {
            return Err(ConfigError::ValidationError(
                "naming.subfolder_pattern requires naming.into_folder".to_string(),
            ));
        }
    }

    if let Some(quality) = config.output.vbr_quality {
        if !(0.0..=10.0).contains(&quality) {
            return Err(ConfigError::ValidationError(format!(
                "output.vbr_quality must be within 0-10, got {quality}"
            )));
        }
    }

    if let Some(level) = config.output.compression_level {
        if level > 12 {
            return Err(ConfigError::ValidationError(format!(
                "output.compression_level must be within 0-12, got {level}"
            )));
        }
        if !config.output.format.is_lossless() {
            return Err(ConfigError::ValidationError(
                "output.compression_level only applies to lossless formats".to_string(),
            ));
        }
    }

    if config.output.bitrate_kbps == Some(0) {
        return Err(ConfigError::ValidationError(
            "output.bitrate_kbps must be positive".to_string(),
        ));
    }

    if config.output.format == OutputFormat::Wav && config.output.bitrate_kbps.is_some() {
        return Err(ConfigError::ValidationError(
            "output.bitrate_kbps does not apply to wav output".to_string(),
        ));
    }

    Ok(())
}
