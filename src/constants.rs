//! Application-wide constants and configuration values

use std::time::Duration;

// Rate computation
/// Minimum spacing (seconds) between two reference samples of a windowed rate
pub const RATE_WINDOW_SECS: f64 = 1.0;
/// Slack (seconds) a client may fall behind its reported buffer before it counts as dropped
pub const DROPPED_GRACE_SECS: f64 = 3.0;

// Event vocabulary
pub const CRITICAL_SEVERITY: &str = "critical";

// Process lifecycle
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(3);
pub const STDOUT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const STDERR_CHUNK_SIZE: usize = 8 * 1024;

/// Invocation strategies tried in order; producer arguments are appended to each
pub const PRODUCER_INVOCATIONS: &[&[&str]] = &[&["talkative_stream_test"], &["go", "run", "main.go"]];

pub const SAVED_STDOUT_PATH: &str = "lastrun.stdout";
pub const SAVED_STDERR_PATH: &str = "lastrun.stderr";

// CI mode
pub const DEFAULT_HARD_TIMEOUT: &str = "10m";
pub const DEFAULT_STEADY_THRESHOLD: &str = "30s";
pub const WATCHDOG_EXIT_GRACE: Duration = Duration::from_secs(2);
pub const WATCHDOG_EXIT_CODE: i32 = 1;

// Display
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(500);
pub const TOP_N: usize = 20;
pub const LAG_BAR_WIDTH: usize = 80;
