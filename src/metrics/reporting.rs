//! Metrics reporting and output formatting

use crate::constants::{LAG_BAR_WIDTH, TOP_N};
use crate::errors::Result;
use crate::metrics::aggregate::Metrics;

use serde::Serialize;
use std::fmt::Write;
use std::path::Path;
use std::time::Duration;

/// Summary handed to CI at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CiSummary {
    pub session_count: usize,
    pub established_count: usize,
}

impl CiSummary {
    pub fn from_metrics(metrics: &Metrics) -> Self {
        Self {
            session_count: metrics.session_count(),
            established_count: metrics.established_count(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the summary as JSON to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{} {}", "#".repeat(40), title);
}

impl Metrics {
    /// Render the live dashboard snapshot
    pub fn render_dashboard(&self) -> String {
        let mut out = String::new();
        self.render_requests(&mut out);
        out.push('\n');
        self.render_streaming(&mut out);
        out.push('\n');
        self.render_instances(&mut out);
        out
    }

    fn render_requests(&self, out: &mut String) {
        section(out, "API requests");
        let _ = writeln!(
            out,
            "Overall average number of requests: {:8.2}/s",
            self.total_request_rate()
        );
        let _ = writeln!(out, "Total number of requests: {}", self.request_count);
        let _ = writeln!(out, "Total number of timeouts: {}", self.timeout_count);

        section(out, &format!("API requests breakdown top {}", TOP_N));
        for (instance_id, rate) in self.request_rate_by_instance().into_iter().take(TOP_N) {
            let _ = writeln!(
                out,
                "Average number of requests for instance {}: {:8.2}/s",
                instance_id, rate
            );
        }
    }

    fn render_streaming(&self, out: &mut String) {
        let sessions = self.session_count();
        let dropped = self.dropped_count();

        section(out, "Streaming");
        let _ = writeln!(
            out,
            "{}/{} sessions established",
            self.established_count(),
            sessions
        );
        let _ = writeln!(
            out,
            "Streams lagged: [{:<width$}] {}/{}",
            "#".repeat(lag_bar_len(dropped, sessions)),
            dropped,
            sessions,
            width = LAG_BAR_WIDTH
        );
        if sessions > 0 {
            let _ = writeln!(
                out,
                "Average rate {:8.2} kbps",
                self.average_byte_rate() * 8.0
            );
        }

        section(out, &format!("Streaming top {}", TOP_N));
        for (session_id, rate) in self.byte_rate_by_session().into_iter().take(TOP_N) {
            let _ = writeln!(
                out,
                "Session {}: overall rate {:8.2} kbps",
                session_id,
                rate * 8.0
            );
        }
    }

    fn render_instances(&self, out: &mut String) {
        section(out, &format!("Instances bitrates infos top {}", TOP_N));
        for (instance_id, recv, sent) in self.bitrate_by_instance().into_iter().take(TOP_N) {
            let _ = writeln!(
                out,
                "Instance {}: IN {:12.2} kbps | OUT {:12.2} kbps",
                instance_id, recv, sent
            );
        }

        section(out, &format!("Instances CPU infos top {}", TOP_N));
        for (instance_id, cpu) in self.cpu_by_instance().into_iter().take(TOP_N) {
            let _ = writeln!(out, "Instance {}: {:3.2}%", instance_id, cpu);
        }
    }

    /// Print the end-of-run report
    pub fn print_report(&self, run_duration: Option<Duration>) {
        println!("\n📊 Load Test Results");
        println!("═══════════════════════════════════════════════════════════════");
        if let Some(duration) = run_duration {
            println!("   Run Duration:     {:.2}s", duration.as_secs_f64());
        }
        println!("   Sessions:         {}", self.session_count());
        println!("   Established:      {}", self.established_count());
        println!("   Lagging:          {}", self.dropped_count());
        println!("   Requests:         {}", self.request_count);
        println!("   Timeouts:         {}", self.timeout_count);
        println!("   Request Rate:     {:.2}/s", self.total_request_rate());
        if self.session_count() > 0 {
            println!(
                "   Average Rate:     {:.2} kbps",
                self.average_byte_rate() * 8.0
            );
        }
        println!("═══════════════════════════════════════════════════════════════");
    }
}

fn lag_bar_len(dropped: usize, sessions: usize) -> usize {
    if sessions == 0 {
        return 0;
    }
    dropped * LAG_BAR_WIDTH / sessions
}
