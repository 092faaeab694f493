//! Windowed rate over a cumulative counter

use crate::constants::RATE_WINDOW_SECS;

/// Converts `(timestamp, cumulative value)` samples into a rate.
///
/// The rate is only recomputed when more than [`RATE_WINDOW_SECS`] separate the
/// sample from the current reference point; closer samples are ignored entirely,
/// reference point included. A counter that goes backwards yields a negative rate,
/// which is reported as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowedRate {
    reference: Option<(f64, f64)>,
    rate: f64,
}

impl WindowedRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample
    pub fn update(&mut self, time: f64, value: f64) {
        match self.reference {
            Some((last_time, last_value)) => {
                if time - last_time > RATE_WINDOW_SECS {
                    self.rate = (value - last_value) / (time - last_time);
                    self.reference = Some((time, value));
                }
            }
            None => self.reference = Some((time, value)),
        }
    }

    /// Most recent windowed rate, 0 until two spaced samples were seen
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Sample the current rate was measured from
    pub fn reference(&self) -> Option<(f64, f64)> {
        self.reference
    }
}
