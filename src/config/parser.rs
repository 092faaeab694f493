//! Command-line argument parsing for loadwatch configuration

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::{CiConfig, Config, OutputConfig, SourceConfig, SourceMode};
use crate::constants::{DEFAULT_HARD_TIMEOUT, DEFAULT_STEADY_THRESHOLD};
use crate::errors::{LoadwatchError, Result};

/// Raw configuration from command line arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "loadwatch",
    version,
    about = "Runs a streaming load test and shows live per-session and per-instance metrics",
    long_about = None
)]
pub struct RawConfig {
    /// Read the event stream from standard input
    #[arg(
        long = "stdin",
        help = "Don't invoke the test, read a test run on STDIN (for debugging)",
        conflicts_with_all = ["saveout", "producer"]
    )]
    pub stdin: bool,

    /// Save producer output
    #[arg(
        long = "saveout",
        help = "Save producer output in lastrun.stdout and lastrun.stderr"
    )]
    pub saveout: bool,

    /// Extra producer command line
    #[arg(
        long = "producer",
        value_name = "COMMAND",
        help = "Producer command tried before the built-in ones"
    )]
    pub producer: Option<String>,

    /// CI mode
    #[arg(
        long = "ci",
        help = "Non-interactive run: stop once streams are steady, fail on hard timeout"
    )]
    pub ci: bool,

    /// Hard timeout for CI runs
    #[arg(
        long = "timeout",
        value_name = "DURATION",
        default_value = DEFAULT_HARD_TIMEOUT,
        help = "Hard timeout in CI mode (e.g. '90s', '1h30m')"
    )]
    pub timeout: String,

    /// Buffer threshold for the steady-state gate
    #[arg(
        long = "steady",
        value_name = "DURATION",
        default_value = DEFAULT_STEADY_THRESHOLD,
        help = "Seconds every stream must have buffered before a CI run stops early"
    )]
    pub steady: String,

    /// Summary output file
    #[arg(
        long = "summary",
        value_name = "PATH",
        help = "Also write the CI summary JSON to this file"
    )]
    pub summary: Option<PathBuf>,

    /// Show producer usage
    #[arg(long = "producer-help", help = "Show the producer's own options and exit")]
    pub producer_help: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,

    /// Arguments forwarded to the producer
    #[arg(
        value_name = "PRODUCER_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "Arguments passed through to the producer"
    )]
    pub producer_args: Vec<String>,
}

impl RawConfig {
    /// Parse from command line arguments
    pub fn parse_from_args() -> Result<Self> {
        Ok(Self::parse())
    }
}

/// Parse a duration made of `<int><unit>` groups, e.g. `1h30m12s5us`.
///
/// Units are `ns`, `us`, `ms`, `s`, `m` and `h`. Empty strings, bare numbers,
/// unknown units and any surrounding characters are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |reason: &str| {
        LoadwatchError::config(format!("Invalid duration '{}': {}", input, reason))
    };

    if input.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total_nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let (number, tail) = rest.split_at(digits);
        let value: u128 = number.parse().map_err(|_| invalid("number out of range"))?;

        let unit_len = tail.bytes().take_while(u8::is_ascii_alphabetic).count();
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit: u128 = match unit {
            "ns" => 1,
            "us" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(invalid("missing unit")),
            other => return Err(invalid(&format!("unknown unit '{}'", other))),
        };

        total_nanos = value
            .checked_mul(nanos_per_unit)
            .and_then(|n| total_nanos.checked_add(n))
            .ok_or_else(|| invalid("too large"))?;
        rest = tail;
    }

    let nanos = u64::try_from(total_nanos).map_err(|_| invalid("too large"))?;
    Ok(Duration::from_nanos(nanos))
}

impl TryFrom<RawConfig> for Config {
    type Error = LoadwatchError;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let ci = if raw.ci {
            Some(CiConfig {
                hard_timeout: parse_duration(&raw.timeout)?,
                steady_threshold: parse_duration(&raw.steady)?,
            })
        } else {
            None
        };

        let mode = if raw.stdin {
            SourceMode::Stdin
        } else {
            SourceMode::Producer
        };

        Ok(Config {
            source: SourceConfig {
                mode,
                producer: raw.producer,
                producer_args: raw.producer_args,
                save_output: raw.saveout,
            },
            ci,
            output: OutputConfig {
                verbose: raw.verbose,
                summary_path: raw.summary,
            },
            producer_help: raw.producer_help,
        })
    }
}
