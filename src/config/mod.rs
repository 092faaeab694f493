//! Configuration management for loadwatch
//!
//! This module provides a clean, layered approach to configuration:
//! - Core structures and enums
//! - CLI argument parsing and duration strings
//! - Configuration validation
//! - Default value management

pub mod defaults;
pub mod parser;
pub mod validation;

pub use parser::parse_duration;

use crate::constants::{SAVED_STDERR_PATH, SAVED_STDOUT_PATH};
use crate::errors::Result;
use crate::source::Invocation;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Where the event stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Launch the producer and read its stdout
    Producer,
    /// Read a recorded run from standard input
    Stdin,
}

/// Event source configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub mode: SourceMode,
    pub producer: Option<String>,
    pub producer_args: Vec<String>,
    pub save_output: bool,
}

/// CI mode configuration
#[derive(Debug, Clone)]
pub struct CiConfig {
    pub hard_timeout: Duration,
    pub steady_threshold: Duration,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub verbose: bool,
    pub summary_path: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub ci: Option<CiConfig>,
    pub output: OutputConfig,
    pub producer_help: bool,
}

impl Config {
    /// Parse and validate configuration from command line arguments
    pub fn from_args() -> Result<Self> {
        let raw_config = parser::RawConfig::parse_from_args()?;
        let config = raw_config.try_into()?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn is_ci(&self) -> bool {
        self.ci.is_some()
    }

    /// Invocation strategies in the order they are tried
    pub fn invocations(&self) -> Vec<Invocation> {
        let mut invocations = Vec::new();
        if let Some(command) = &self.source.producer {
            invocations.push(Invocation::from_command_line(command));
        }
        invocations.extend(Invocation::builtin());
        invocations
    }

    /// Files the producer's stdout and stderr are copied into
    pub fn output_sinks(&self) -> (Option<&Path>, Option<&Path>) {
        if self.source.save_output {
            (
                Some(Path::new(SAVED_STDOUT_PATH)),
                Some(Path::new(SAVED_STDERR_PATH)),
            )
        } else {
            (None, None)
        }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        match self.source.mode {
            SourceMode::Stdin => info!("   Source:           stdin"),
            SourceMode::Producer => {
                let strategies: Vec<String> =
                    self.invocations().iter().map(|i| i.to_string()).collect();
                info!("   Producer:         {}", strategies.join(" | "));
                info!("   Producer Args:    {}", self.source.producer_args.join(" "));
                if self.source.save_output {
                    info!(
                        "   Saving Output:    {}, {}",
                        SAVED_STDOUT_PATH, SAVED_STDERR_PATH
                    );
                }
            }
        }

        match &self.ci {
            Some(ci) => {
                info!("   Mode:             CI");
                info!("   Hard Timeout:     {:?}", ci.hard_timeout);
                info!("   Steady Threshold: {:?}", ci.steady_threshold);
            }
            None => info!("   Mode:             interactive"),
        }
    }
}
