//! Aggregate metrics across all sessions and instances

use crate::common::{InstanceId, SessionId};
use crate::metrics::instance::Instance;
use crate::metrics::session::Session;

use std::cmp::Ordering;
use std::collections::HashMap;

/// Owns every live entity of a run plus the running totals.
///
/// Only the event loop mutates it, so no locking is involved. Every derived view
/// is computed on demand.
#[derive(Debug, Default)]
pub struct Metrics {
    sessions: HashMap<SessionId, Session>,
    instances: HashMap<InstanceId, Instance>,
    pub request_count: u64,
    pub timeout_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session, creating it with `start_epoch` if it has not been seen yet
    pub fn session_or_insert(&mut self, session_id: &str, start_epoch: f64) -> &mut Session {
        self.sessions
            .entry(SessionId::from(session_id))
            .or_insert_with_key(|id| Session::new(id.clone(), start_epoch))
    }

    /// Get an instance, creating it on first use
    pub fn instance_or_insert(&mut self, instance_id: &str) -> &mut Instance {
        self.instances
            .entry(InstanceId::from(instance_id))
            .or_insert_with_key(|id| Instance::new(id.clone()))
    }

    /// Drop a session entirely
    pub fn remove_session(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeout_count += 1;
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn instance(&self, instance_id: &str) -> Option<&Instance> {
        self.instances.get(instance_id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sum of every session's average request rate
    pub fn total_request_rate(&self) -> f64 {
        self.sessions().map(|s| s.avg_request_rate).sum()
    }

    /// Request rates summed per instance id, highest first
    pub fn request_rate_by_instance(&self) -> Vec<(InstanceId, f64)> {
        let mut by_instance: HashMap<&InstanceId, f64> = HashMap::new();
        for session in self.sessions() {
            *by_instance.entry(&session.instance_id).or_insert(0.0) += session.avg_request_rate;
        }
        let rates = by_instance
            .into_iter()
            .map(|(id, rate)| (id.clone(), rate))
            .collect();
        sorted_desc(rates)
    }

    /// Sessions that have started streaming
    pub fn established_count(&self) -> usize {
        self.sessions().filter(|s| s.is_established()).count()
    }

    pub fn dropped_count(&self) -> usize {
        self.sessions().filter(|s| s.dropped).count()
    }

    /// Mean windowed throughput in KB/s, 0 without sessions
    pub fn average_byte_rate(&self) -> f64 {
        if self.sessions.is_empty() {
            return 0.0;
        }
        let total: f64 = self.sessions().map(|s| s.bytes_per_sec_average()).sum();
        total / self.sessions.len() as f64
    }

    /// Windowed throughput per session, highest first
    pub fn byte_rate_by_session(&self) -> Vec<(SessionId, f64)> {
        let rates = self
            .sessions()
            .map(|s| (s.session_id.clone(), s.bytes_per_sec_average()))
            .collect();
        sorted_desc(rates)
    }

    /// `(instance, recv, sent)` rates, busiest receiver first
    pub fn bitrate_by_instance(&self) -> Vec<(InstanceId, f64, f64)> {
        let mut rates: Vec<_> = self
            .instances()
            .map(|i| (i.instance_id.clone(), i.bitrate_recv(), i.bitrate_sent()))
            .collect();
        rates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        rates
    }

    /// CPU usage per instance, busiest first
    pub fn cpu_by_instance(&self) -> Vec<(InstanceId, f64)> {
        let usage = self
            .instances()
            .map(|i| (i.instance_id.clone(), i.cpu_usage))
            .collect();
        sorted_desc(usage)
    }

    /// True once every session streams with at least `threshold_secs` buffered.
    ///
    /// Never vacuously true: no sessions, or any session that has not started
    /// streaming yet, means not steady.
    pub fn all_streams_steady(&self, threshold_secs: f64) -> bool {
        if self.sessions.is_empty() || self.established_count() < self.session_count() {
            return false;
        }
        self.sessions().all(|s| s.secs_buffered >= threshold_secs)
    }
}

fn sorted_desc<K>(mut entries: Vec<(K, f64)>) -> Vec<(K, f64)> {
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_session(metrics: &mut Metrics, id: &str, buffered: f64) {
        metrics.session_or_insert(id, 0.0).on_buffered(1.0, buffered);
    }

    #[test]
    fn test_get_or_create_keeps_first_epoch() {
        let mut metrics = Metrics::new();
        metrics.session_or_insert("s1", 3.0);
        metrics.session_or_insert("s1", 9.0);
        assert_eq!(metrics.session_count(), 1);
        assert_eq!(metrics.session("s1").unwrap().start_epoch, 3.0);
    }

    #[test]
    fn test_steady_is_false_without_sessions() {
        assert!(!Metrics::new().all_streams_steady(0.0));
    }

    #[test]
    fn test_steady_requires_every_session_established() {
        let mut metrics = Metrics::new();
        streaming_session(&mut metrics, "s1", 40.0);
        metrics.session_or_insert("s2", 0.0);
        assert!(!metrics.all_streams_steady(30.0));
    }

    #[test]
    fn test_steady_threshold() {
        let mut metrics = Metrics::new();
        streaming_session(&mut metrics, "s1", 40.0);
        streaming_session(&mut metrics, "s2", 29.9);
        assert!(!metrics.all_streams_steady(30.0));

        streaming_session(&mut metrics, "s2", 30.0);
        assert!(metrics.all_streams_steady(30.0));
    }

    #[test]
    fn test_request_rate_grouping() {
        let mut metrics = Metrics::new();
        for (id, host, rate) in [("s1", "a", 1.0), ("s2", "a", 2.0), ("s3", "b", 0.5), ("s4", "", 0.25)] {
            let session = metrics.session_or_insert(id, 0.0);
            session.bind_instance(InstanceId::from(host));
            session.avg_request_rate = rate;
        }

        assert_eq!(metrics.total_request_rate(), 3.75);
        let by_instance = metrics.request_rate_by_instance();
        assert_eq!(by_instance[0], (InstanceId::from("a"), 3.0));
        assert_eq!(by_instance[1], (InstanceId::from("b"), 0.5));
        assert_eq!(by_instance[2], (InstanceId::from(""), 0.25));
    }

    #[test]
    fn test_counts_and_average_byte_rate() {
        let mut metrics = Metrics::new();
        assert_eq!(metrics.average_byte_rate(), 0.0);

        let s1 = metrics.session_or_insert("s1", 0.0);
        s1.on_kilobytes(0.0, 0.0);
        s1.on_kilobytes(2.0, 200.0);
        let s2 = metrics.session_or_insert("s2", 0.0);
        s2.on_buffered(0.0, 0.0);
        s2.on_buffered(10.0, 1.0);
        metrics.session_or_insert("s3", 0.0);

        assert_eq!(metrics.established_count(), 2);
        assert_eq!(metrics.dropped_count(), 1);
        assert_eq!(metrics.average_byte_rate(), 100.0 / 3.0);
        assert_eq!(metrics.byte_rate_by_session()[0], (SessionId::from("s1"), 100.0));
    }

    #[test]
    fn test_instances_outlive_sessions() {
        let mut metrics = Metrics::new();
        metrics
            .session_or_insert("s1", 0.0)
            .bind_instance(InstanceId::from("host1"));
        metrics.instance_or_insert("host1").on_cpu_usage(50.0);

        assert!(metrics.remove_session("s1").is_some());
        assert!(metrics.session("s1").is_none());
        assert_eq!(metrics.instance("host1").unwrap().cpu_usage, 50.0);
        assert_eq!(metrics.cpu_by_instance(), vec![(InstanceId::from("host1"), 50.0)]);
    }
}
