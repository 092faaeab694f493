//! Domain-specific error types for loadwatch
//!
//! This module provides structured error types using `thiserror` for
//! precise and ergonomic error handling throughout the application.

use thiserror::Error;

/// Main error type for the loadwatch application
#[derive(Error, Debug)]
pub enum LoadwatchError {
    /// Configuration-related errors (CLI parsing, duration strings, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No invocation strategy could launch the producer
    #[error("Launch error: {0}")]
    Launch(String),

    /// Errors while supervising the running producer
    #[error("Process error: {0}")]
    Process(String),

    /// Malformed or inconsistent event records
    #[error("Event error: {0}")]
    Event(String),

    /// I/O errors from pipes and sinks
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using LoadwatchError
pub type Result<T> = std::result::Result<T, LoadwatchError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_config_context(self, msg: &str) -> Result<T>;
    fn with_process_context(self, msg: &str) -> Result<T>;
    fn with_event_context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| LoadwatchError::Config(format!("{}: {}", msg, e)))
    }

    fn with_process_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| LoadwatchError::Process(format!("{}: {}", msg, e)))
    }

    fn with_event_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| LoadwatchError::Event(format!("{}: {}", msg, e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LoadwatchError::Config(msg.to_string()))
    }

    fn with_process_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LoadwatchError::Process(msg.to_string()))
    }

    fn with_event_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LoadwatchError::Event(msg.to_string()))
    }
}

// Convenience constructors
impl LoadwatchError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LoadwatchError::Config(msg.into())
    }

    pub fn launch<S: Into<String>>(msg: S) -> Self {
        LoadwatchError::Launch(msg.into())
    }

    pub fn process<S: Into<String>>(msg: S) -> Self {
        LoadwatchError::Process(msg.into())
    }

    pub fn event<S: Into<String>>(msg: S) -> Self {
        LoadwatchError::Event(msg.into())
    }
}
