//! Per-session streaming and request metrics

use crate::common::{InstanceId, SessionId};
use crate::constants::DROPPED_GRACE_SECS;
use crate::metrics::rate::WindowedRate;

/// State of a single test session
///
/// Two epochs anchor the derived values: `start_epoch` (first event seen) drives the
/// request rate, `streaming_start_epoch` (first streaming sample) drives buffering
/// and throughput.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: SessionId,
    pub start_epoch: f64,
    pub streaming_start_epoch: Option<f64>,
    pub instance_id: InstanceId,
    pub bytes_per_sec_overall: f64,
    pub secs_buffered: f64,
    pub dropped: bool,
    pub request_count: u64,
    pub avg_request_rate: f64,
    throughput: WindowedRate,
}

impl Session {
    pub fn new(session_id: SessionId, start_epoch: f64) -> Self {
        Self {
            session_id,
            start_epoch,
            streaming_start_epoch: None,
            instance_id: InstanceId::default(),
            bytes_per_sec_overall: 0.0,
            secs_buffered: 0.0,
            dropped: false,
            request_count: 0,
            avg_request_rate: 0.0,
            throughput: WindowedRate::new(),
        }
    }

    /// Record the client-side buffer depth
    pub fn on_buffered(&mut self, time: f64, secs_buffered: f64) {
        let streaming_start = self.mark_streaming(time);
        self.secs_buffered = secs_buffered;
        self.dropped = time - streaming_start > secs_buffered + DROPPED_GRACE_SECS;
    }

    /// Record the cumulative kilobytes received so far
    pub fn on_kilobytes(&mut self, time: f64, kilobytes: f64) {
        let streaming_start = self.mark_streaming(time);
        let relative = time - streaming_start;
        if relative > 0.0 {
            self.bytes_per_sec_overall = kilobytes / relative;
        }
        self.throughput.update(time, kilobytes);
    }

    /// Count one API request
    pub fn on_api_request(&mut self, time: f64) {
        self.request_count += 1;
        self.refresh_request_rate(time);
    }

    /// Recompute the request rate against the session start
    pub fn refresh_request_rate(&mut self, time: f64) {
        if time != self.start_epoch {
            self.avg_request_rate = self.request_count as f64 / (time - self.start_epoch);
        }
    }

    /// Bind the session to the instance running it
    pub fn bind_instance(&mut self, instance_id: InstanceId) {
        self.instance_id = instance_id;
    }

    /// Windowed throughput in KB/s
    pub fn bytes_per_sec_average(&self) -> f64 {
        self.throughput.rate()
    }

    pub fn is_established(&self) -> bool {
        self.streaming_start_epoch.is_some()
    }

    fn mark_streaming(&mut self, time: f64) -> f64 {
        *self.streaming_start_epoch.get_or_insert(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionId::from("s1"), 0.0)
    }

    #[test]
    fn test_first_streaming_signal_wins() {
        let mut s = session();
        assert!(!s.is_established());
        s.on_buffered(4.0, 1.0);
        s.on_kilobytes(6.0, 10.0);
        assert_eq!(s.streaming_start_epoch, Some(4.0));
    }

    #[test]
    fn test_dropped_threshold() {
        let mut s = session();
        s.on_kilobytes(10.0, 0.0);

        s.on_buffered(14.0, 1.0);
        assert!(!s.dropped, "4s elapsed == 1s buffered + 3s grace");

        s.on_buffered(14.5, 1.0);
        assert!(s.dropped);

        s.on_buffered(15.0, 3.0);
        assert!(!s.dropped, "catching up clears the flag");
    }

    #[test]
    fn test_overall_rate_since_streaming_start() {
        let mut s = session();
        s.on_kilobytes(5.0, 0.0);
        assert_eq!(s.bytes_per_sec_overall, 0.0);
        s.on_kilobytes(5.5, 50.0);
        assert_eq!(s.bytes_per_sec_overall, 100.0);
        assert_eq!(s.bytes_per_sec_average(), 0.0, "windowed rate is debounced");
        s.on_kilobytes(7.0, 150.0);
        assert_eq!(s.bytes_per_sec_overall, 75.0);
        assert_eq!(s.bytes_per_sec_average(), 75.0);
    }

    #[test]
    fn test_request_rate_guarded_at_start_epoch() {
        let mut s = Session::new(SessionId::from("s1"), 2.0);
        s.on_api_request(2.0);
        assert_eq!(s.request_count, 1);
        assert_eq!(s.avg_request_rate, 0.0);

        s.on_api_request(4.0);
        assert_eq!(s.avg_request_rate, 1.0);

        s.refresh_request_rate(6.0);
        assert_eq!(s.avg_request_rate, 0.5);
    }
}
