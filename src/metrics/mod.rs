//! Metrics engine for streaming load-test runs
//!
//! This module provides a clean, modular approach to metrics:
//! - Windowed rate computation over cumulative counters
//! - Per-session and per-instance entity state
//! - Aggregate views across all live entities
//! - Dashboard and summary rendering

pub mod aggregate;
pub mod instance;
pub mod rate;
pub mod reporting;
pub mod session;

// Re-export public types for easier access
pub use aggregate::Metrics;
pub use instance::Instance;
pub use reporting::CiSummary;
pub use session::Session;
