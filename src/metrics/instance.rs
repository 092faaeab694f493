//! Per-instance resource metrics

use crate::common::InstanceId;
use crate::metrics::rate::WindowedRate;

/// Worker/host resource usage; created on its first sample and never removed
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub instance_id: InstanceId,
    /// Last reported CPU utilisation in percent
    pub cpu_usage: f64,
    recv: WindowedRate,
    sent: WindowedRate,
}

impl Instance {
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            cpu_usage: 0.0,
            recv: WindowedRate::new(),
            sent: WindowedRate::new(),
        }
    }

    pub fn on_kilobytes_received(&mut self, time: f64, kilobytes: f64) {
        self.recv.update(time, kilobytes);
    }

    pub fn on_kilobytes_sent(&mut self, time: f64, kilobytes: f64) {
        self.sent.update(time, kilobytes);
    }

    pub fn on_cpu_usage(&mut self, cpu_usage: f64) {
        self.cpu_usage = cpu_usage;
    }

    pub fn bitrate_recv(&self) -> f64 {
        self.recv.rate()
    }

    pub fn bitrate_sent(&self) -> f64 {
        self.sent.rate()
    }
}
