//! Test runner wiring the event source, the metrics engine and the supervisors

use crate::config::{Config, SourceMode};
use crate::constants::{WATCHDOG_EXIT_CODE, WATCHDOG_EXIT_GRACE};
use crate::dispatch::{StreamStats, fill_metrics};
use crate::display::Reporter;
use crate::errors::{ErrorContext, Result};
use crate::metrics::{CiSummary, Metrics};
use crate::source::{LineSource, PolledLines, ProcessController};
use crate::supervise::{SteadyStateGate, Watchdog};

use std::time::Instant;
use tokio::io::BufReader;
use tracing::{error, info, warn};

/// Exit status used after printing the producer's own usage
pub const PRODUCER_HELP_EXIT_CODE: i32 = 2;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub stats: StreamStats,
    pub summary: Option<CiSummary>,
}

/// Drives one load-test run from launch to summary
pub struct TestRunner {
    config: Config,
    metrics: Metrics,
    controller: ProcessController,
}

impl TestRunner {
    pub fn new(config: Config) -> Self {
        let controller = ProcessController::new(config.invocations());
        Self {
            config,
            metrics: Metrics::new(),
            controller,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn controller(&self) -> &ProcessController {
        &self.controller
    }

    /// Run the test until the stream ends or a supervisor stops it
    pub async fn run(&mut self) -> Result<RunOutcome> {
        if self.config.producer_help {
            return self.show_producer_help().await;
        }

        self.setup_signal_handler();
        let mut source = self.open_source().await?;

        let outcome = if self.config.is_ci() {
            self.run_ci(source.as_mut()).await
        } else {
            self.run_interactive(source.as_mut()).await
        };

        // Make sure nothing is left running, whatever ended the stream
        if let Err(e) = self.controller.stop().await {
            error!("Failed to stop producer: {}", e);
        }

        outcome
    }

    /// Set up signal handler for graceful shutdown
    fn setup_signal_handler(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl+c: {}", e);
                return;
            }
            warn!("Received Ctrl+C, stopping the producer...");
            if let Err(e) = controller.stop().await {
                error!("Failed to stop producer: {}", e);
            }
        });
    }

    async fn open_source(&self) -> Result<Box<dyn LineSource>> {
        match self.config.source.mode {
            SourceMode::Stdin => {
                info!("Reading test run from stdin");
                Ok(Box::new(PolledLines::new(
                    BufReader::new(tokio::io::stdin()),
                    self.controller.clone(),
                )))
            }
            SourceMode::Producer => {
                let (stdout_sink, stderr_sink) = self.config.output_sinks();
                let lines = self
                    .controller
                    .start(&self.config.source.producer_args, stdout_sink, stderr_sink)
                    .await?;
                Ok(Box::new(lines))
            }
        }
    }

    async fn run_interactive(&mut self, source: &mut dyn LineSource) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut reporter = Reporter::default();

        let stats = fill_metrics(&mut self.metrics, source, |metrics| reporter.update(metrics)).await?;

        info!(
            "Stream ended after {} lines ({} rejected)",
            stats.lines, stats.rejected
        );
        self.metrics.print_report(Some(started.elapsed()));

        Ok(RunOutcome {
            exit_code: 0,
            stats,
            summary: None,
        })
    }

    async fn run_ci(&mut self, source: &mut dyn LineSource) -> Result<RunOutcome> {
        let ci = self
            .config
            .ci
            .clone()
            .with_config_context("CI run without CI configuration")?;

        let watchdog = Watchdog::arm(
            ci.hard_timeout,
            self.controller.clone(),
            WATCHDOG_EXIT_GRACE,
            || std::process::exit(WATCHDOG_EXIT_CODE),
        );
        let mut gate = SteadyStateGate::new(ci.steady_threshold, self.controller.clone());

        let streamed = fill_metrics(&mut self.metrics, source, |metrics| {
            gate.evaluate(metrics);
        })
        .await;

        if let Err(e) = self.controller.stop().await {
            error!("Failed to stop producer: {}", e);
        }
        let timed_out = watchdog.disarm();
        let stats = streamed?;

        let summary = CiSummary::from_metrics(&self.metrics);
        println!("{}", summary.to_json()?);
        if let Some(path) = &self.config.output.summary_path {
            summary.write_to(path)?;
        }

        let exit_code = if timed_out {
            error!("Test run hit the hard timeout");
            WATCHDOG_EXIT_CODE
        } else {
            if gate.triggered() {
                info!("Test run reached steady state");
            }
            0
        };

        Ok(RunOutcome {
            exit_code,
            stats,
            summary: Some(summary),
        })
    }

    /// Print the producer's own usage
    async fn show_producer_help(&self) -> Result<RunOutcome> {
        let mut lines = self
            .controller
            .start(&["-h".to_string()], None, None)
            .await?;
        while let Some(line) = lines.next_line().await? {
            println!("{}", line);
        }
        self.controller.stop().await?;

        Ok(RunOutcome {
            exit_code: PRODUCER_HELP_EXIT_CODE,
            stats: StreamStats::default(),
            summary: None,
        })
    }
}
