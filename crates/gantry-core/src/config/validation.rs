//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::GantryConfig;

/// Validate configuration
pub fn validate_config(config: &GantryConfig) -> Result<()> {
    debug!("validating configuration");
    validate_backend(config)?;
    validate_build(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_backend(config: &GantryConfig) -> Result<()> {
    if config.backend.executable.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "backend.executable".to_string(),
            message: "executable cannot be empty".to_string(),
        }
        .into());
    }

    if config.backend.query_outputs_flag.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "backend.query_outputs_flag".to_string(),
            message: "flag cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_build(config: &GantryConfig) -> Result<()> {
    if config.build.lock_poll_interval_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "build.lock_poll_interval_ms".to_string(),
            message: "interval must be greater than zero".to_string(),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GantryConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = GantryConfig::default();
        config.build.lock_poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }
}
