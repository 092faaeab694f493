//! Routes decoded events to metric mutations

use crate::common::InstanceId;
use crate::constants::CRITICAL_SEVERITY;
use crate::errors::{LoadwatchError, Result};
use crate::event::{Event, Metric};
use crate::metrics::Metrics;
use crate::source::LineSource;

use tracing::{debug, warn};

/// Counters describing how a stream was consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: u64,
    pub dispatched: u64,
    pub rejected: u64,
}

/// Apply one event to the aggregate
pub fn dispatch(metrics: &mut Metrics, event: &Event) -> Result<()> {
    let id = event.entity_id.as_str();
    let time = event.timestamp;

    match event.metric {
        Metric::StartTestOnMachine => {
            metrics
                .session_or_insert(id, time)
                .bind_instance(InstanceId::from(event.value.as_str()));
        }
        Metric::ApiRequest => {
            metrics.record_request();
            let session = metrics.session_or_insert(id, time);
            if session.instance_id.is_empty() {
                session.bind_instance(InstanceId::from(event.value.as_str()));
            }
            session.on_api_request(time);
        }
        Metric::ApiRequestTimeout => {
            metrics.session_or_insert(id, time);
            metrics.record_timeout();
        }
        Metric::ApiError => {
            if event.value == CRITICAL_SEVERITY {
                metrics.remove_session(id).ok_or_else(|| {
                    LoadwatchError::event(format!("critical error for unknown session '{}'", id))
                })?;
                debug!("Session {} removed after critical API error", id);
            } else {
                metrics.session_or_insert(id, time);
            }
        }
        Metric::StreamProgressKiloBytes => {
            let kilobytes = event.numeric_value()?;
            metrics.session_or_insert(id, time).on_kilobytes(time, kilobytes);
        }
        Metric::StreamProgressSeconds => {
            let buffered = event.numeric_value()?;
            let session = metrics.session_or_insert(id, time);
            session.on_buffered(time, buffered);
            session.refresh_request_rate(time);
        }
        Metric::KiloBytesSent => {
            let kilobytes = event.numeric_value()?;
            metrics.instance_or_insert(id).on_kilobytes_sent(time, kilobytes);
        }
        Metric::KiloBytesRecv => {
            let kilobytes = event.numeric_value()?;
            metrics
                .instance_or_insert(id)
                .on_kilobytes_received(time, kilobytes);
        }
        Metric::CpuUsage => {
            let cpu = event.numeric_value()?;
            metrics.instance_or_insert(id).on_cpu_usage(cpu);
        }
        // Producers may add metrics ahead of this consumer
        Metric::Unknown => {}
    }

    Ok(())
}

/// Drain `source` into `metrics`, invoking `on_update` once after every routed event.
///
/// Lines that fail to decode are skipped. Events that fail to apply are logged and
/// still followed by `on_update`; neither ends the run.
pub async fn fill_metrics<S, F>(
    metrics: &mut Metrics,
    source: &mut S,
    mut on_update: F,
) -> Result<StreamStats>
where
    S: LineSource + ?Sized,
    F: FnMut(&Metrics),
{
    let mut stats = StreamStats::default();

    while let Some(line) = source.next_line().await? {
        stats.lines += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match Event::parse_line(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping undecodable line {:?}: {}", line, e);
                stats.rejected += 1;
                continue;
            }
        };

        if let Err(e) = dispatch(metrics, &event) {
            warn!("Failed to apply {:?} for {}: {}", event.metric, event.entity_id, e);
            stats.rejected += 1;
        } else {
            stats.dispatched += 1;
        }
        on_update(metrics);
    }

    Ok(stats)
}
