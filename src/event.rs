//! Typed event records produced by a load-test run
//!
//! Each stdout line of the producer is one metric sample:
//! `entity_id,timestamp_seconds,metric_name,value[,ignored...]`.

use crate::errors::{ErrorContext, LoadwatchError, Result};

/// Closed set of metric names the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    StartTestOnMachine,
    ApiRequest,
    ApiRequestTimeout,
    ApiError,
    StreamProgressKiloBytes,
    StreamProgressSeconds,
    KiloBytesSent,
    KiloBytesRecv,
    CpuUsage,
    /// Any name the producer emits that has no handler; dispatching it is a no-op
    Unknown,
}

impl Metric {
    /// Map a wire metric name to its variant
    pub fn from_name(name: &str) -> Self {
        match name {
            "StartTestOnMachine" => Metric::StartTestOnMachine,
            "ApiRequest" => Metric::ApiRequest,
            "ApiRequestTimeout" => Metric::ApiRequestTimeout,
            "ApiError" => Metric::ApiError,
            "StreamProgressKiloBytes" => Metric::StreamProgressKiloBytes,
            "StreamProgressSeconds" => Metric::StreamProgressSeconds,
            "KiloBytesSent" => Metric::KiloBytesSent,
            "KiloBytesRecv" => Metric::KiloBytesRecv,
            "CPUUsage" => Metric::CpuUsage,
            _ => Metric::Unknown,
        }
    }
}

/// One decoded metric sample
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub entity_id: String,
    pub timestamp: f64,
    pub metric: Metric,
    pub value: String,
}

impl Event {
    pub fn new(
        entity_id: impl Into<String>,
        timestamp: f64,
        metric: Metric,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            metric,
            value: value.into(),
        }
    }

    /// Build an event from already split fields; anything past the fourth is ignored
    pub fn from_fields(fields: &[&str]) -> Result<Self> {
        let [entity_id, stamp, metric, value, ..] = fields else {
            return Err(LoadwatchError::event(format!(
                "expected at least 4 fields, got {}",
                fields.len()
            )));
        };

        let timestamp = stamp
            .trim()
            .parse::<f64>()
            .with_event_context(&format!("invalid timestamp '{}'", stamp))?;

        Ok(Self::new(
            *entity_id,
            timestamp,
            Metric::from_name(metric),
            *value,
        ))
    }

    /// Decode a single comma separated line
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').map(unquote).collect();
        Self::from_fields(&fields)
    }

    /// Numeric payload for metrics that carry a float value
    pub fn numeric_value(&self) -> Result<f64> {
        self.value.trim().parse::<f64>().with_event_context(&format!(
            "invalid {:?} value '{}' for {}",
            self.metric, self.value, self.entity_id
        ))
    }
}

fn unquote(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}
