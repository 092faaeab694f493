//! Default values and configuration presets

use super::{CiConfig, Config, OutputConfig, SourceConfig, SourceMode};
use std::time::Duration;

/// Default configuration values
pub struct Defaults;

impl Defaults {
    pub const HARD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
    pub const STEADY_THRESHOLD: Duration = Duration::from_secs(30);
}

impl Config {
    /// Interactive run launching the producer with `producer_args`
    pub fn default_interactive(producer_args: Vec<String>) -> Self {
        Self {
            source: SourceConfig {
                mode: SourceMode::Producer,
                producer: None,
                producer_args,
                save_output: false,
            },
            ci: None,
            output: OutputConfig {
                verbose: false,
                summary_path: None,
            },
            producer_help: false,
        }
    }

    /// CI run with the default timeout and steady-state threshold
    pub fn default_ci(producer_args: Vec<String>) -> Self {
        let mut config = Self::default_interactive(producer_args);
        config.ci = Some(CiConfig {
            hard_timeout: Defaults::HARD_TIMEOUT,
            steady_threshold: Defaults::STEADY_THRESHOLD,
        });
        config
    }

    /// CI replay of a recorded run from stdin
    pub fn replay_ci() -> Self {
        let mut config = Self::default_ci(Vec::new());
        config.source.mode = SourceMode::Stdin;
        config
    }
}
