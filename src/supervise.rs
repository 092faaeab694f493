//! CI-mode supervision: hard-timeout watchdog and steady-state gate
//!
//! Both race to stop the same [`ProcessController`]; whichever fires first runs
//! the interrupt/kill sequence and the other's stop is a no-op.

use crate::metrics::Metrics;
use crate::source::ProcessController;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Timer that stops the run once the hard timeout expires
#[derive(Debug)]
pub struct Watchdog {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    /// Arm the timer.
    ///
    /// On expiry it stops `controller`, waits `exit_grace` and then calls
    /// `on_expire`, which in production terminates the process with a non-zero
    /// status.
    pub fn arm<F>(
        hard_timeout: Duration,
        controller: ProcessController,
        exit_grace: Duration,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_flag = Arc::clone(&fired);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(hard_timeout).await;
            fired_flag.store(true, Ordering::Release);
            error!("Hard timeout of {:?} reached, stopping the test run", hard_timeout);

            if let Err(e) = controller.stop().await {
                error!("Failed to stop producer after timeout: {}", e);
            }
            tokio::time::sleep(exit_grace).await;
            on_expire();
        });

        Self { handle, fired }
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Cancel the timer unless it already fired; returns whether it fired
    pub fn disarm(self) -> bool {
        let fired = self.fired();
        if !fired {
            self.handle.abort();
        }
        fired
    }
}

/// Stops the run once every stream has buffered enough
#[derive(Debug)]
pub struct SteadyStateGate {
    threshold_secs: f64,
    controller: ProcessController,
    triggered: bool,
}

impl SteadyStateGate {
    pub fn new(threshold: Duration, controller: ProcessController) -> Self {
        Self {
            threshold_secs: threshold.as_secs_f64(),
            controller,
            triggered: false,
        }
    }

    /// Check the predicate after an event; requests a stop the first time it holds
    pub fn evaluate(&mut self, metrics: &Metrics) -> bool {
        if self.triggered {
            return true;
        }
        if metrics.all_streams_steady(self.threshold_secs) {
            info!(
                "All {} streams buffered at least {:.1}s, stopping the test run",
                metrics.session_count(),
                self.threshold_secs
            );
            self.triggered = true;
            self.controller.request_stop();
        }
        self.triggered
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }
}
