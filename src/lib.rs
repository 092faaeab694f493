//! Live metrics engine and process supervisor for streaming load-test runs.
//!
//! The producer (a load-test binary) writes one metric sample per line; the
//! engine folds them into per-session and per-instance statistics, while the
//! controller launches the producer and stops it on request, on steady state
//! or on a hard timeout.

pub mod common;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod display;
pub mod errors;
pub mod event;
pub mod metrics;
pub mod runner;
pub mod source;
pub mod supervise;
