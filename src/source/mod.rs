//! Event line sources
//!
//! This module provides the inputs the dispatcher consumes:
//! - A lifecycle controller that launches and supervises the producer process
//! - A stop-aware line stream over the producer's stdout (or stdin)
//! - An in-memory source for replaying canned lines

pub mod controller;
pub mod lines;

// Re-export public types for easier access
pub use controller::{ControllerState, Invocation, ProcessController};
pub use lines::PolledLines;

use crate::errors::Result;

use async_trait::async_trait;
use std::collections::VecDeque;

/// Common interface for anything that yields producer output line by line
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, `None` once the stream has ended
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Lines held in memory
#[derive(Debug, Default)]
pub struct VecLines {
    lines: VecDeque<String>,
}

impl VecLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LineSource for VecLines {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}
