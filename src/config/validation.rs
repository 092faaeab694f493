//! Configuration validation logic

use super::{Config, SourceMode};
use crate::errors::{LoadwatchError, Result};

/// Validate the configuration
pub fn validate(config: &Config) -> Result<()> {
    validate_source(config)?;
    validate_ci(config)?;
    Ok(())
}

/// Validate event source configuration
fn validate_source(config: &Config) -> Result<()> {
    if let Some(command) = &config.source.producer
        && command.trim().is_empty()
    {
        return Err(LoadwatchError::config("Producer command cannot be empty"));
    }

    if config.source.mode == SourceMode::Stdin && config.producer_help {
        return Err(LoadwatchError::config(
            "--producer-help needs a producer, it cannot be combined with --stdin",
        ));
    }

    Ok(())
}

/// Validate CI configuration
fn validate_ci(config: &Config) -> Result<()> {
    let Some(ci) = &config.ci else {
        if config.output.summary_path.is_some() {
            return Err(LoadwatchError::config("--summary is only available with --ci"));
        }
        return Ok(());
    };

    if ci.hard_timeout.is_zero() {
        return Err(LoadwatchError::config("Hard timeout must be greater than 0"));
    }

    if ci.steady_threshold.is_zero() {
        return Err(LoadwatchError::config(
            "Steady-state threshold must be greater than 0",
        ));
    }

    Ok(())
}
