//! Throttled terminal dashboard

use crate::constants::REFRESH_INTERVAL;
use crate::metrics::Metrics;

use std::io::Write;
use std::time::{Duration, Instant};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Repaints the dashboard at most once per refresh interval
#[derive(Debug)]
pub struct Reporter {
    interval: Duration,
    last_render: Option<Instant>,
    renders: u64,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(REFRESH_INTERVAL)
    }
}

impl Reporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_render: None,
            renders: 0,
        }
    }

    /// Called after every event; paints only when the interval has elapsed
    pub fn update(&mut self, metrics: &Metrics) {
        if !self.due(Instant::now()) {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}{}", CLEAR_SCREEN, metrics.render_dashboard());
        let _ = stdout.flush();
    }

    fn due(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_render
            && now.duration_since(last) < self.interval
        {
            return false;
        }
        self.last_render = Some(now);
        self.renders += 1;
        true
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}
