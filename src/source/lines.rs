//! Stop-aware line stream

use crate::constants::STDOUT_POLL_INTERVAL;
use crate::errors::Result;
use crate::source::LineSource;
use crate::source::controller::ProcessController;

use async_trait::async_trait;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufWriter, Lines};
use tokio::time::timeout;
use tracing::debug;

/// Reads lines while polling the controller's stop flag.
///
/// Each read waits at most one poll interval. Once a stop has completed the
/// stream ends before the next read, even if lines are still arriving. While the
/// stop is in progress it keeps delivering output, unless the stream is idle and
/// nothing was ever received.
pub struct PolledLines<R> {
    lines: Lines<R>,
    controller: ProcessController,
    sink: Option<BufWriter<File>>,
    poll_interval: Duration,
    seen_data: bool,
}

impl<R> PolledLines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, controller: ProcessController) -> Self {
        Self {
            lines: reader.lines(),
            controller,
            sink: None,
            poll_interval: STDOUT_POLL_INTERVAL,
            seen_data: false,
        }
    }

    /// Copy every delivered line into `file`
    pub fn with_sink(mut self, file: File) -> Self {
        self.sink = Some(BufWriter::new(file));
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn finish(&mut self) -> Result<Option<String>> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush().await?;
        }
        Ok(None)
    }
}

#[async_trait]
impl<R> LineSource for PolledLines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if self.controller.stop_requested() && self.controller.is_finished() {
                debug!("Producer stopped, ending the line stream");
                return self.finish().await;
            }

            match timeout(self.poll_interval, self.lines.next_line()).await {
                Ok(read) => {
                    let Some(line) = read? else {
                        return self.finish().await;
                    };
                    self.seen_data = true;
                    if let Some(sink) = self.sink.as_mut() {
                        sink.write_all(line.as_bytes()).await?;
                        sink.write_all(b"\n").await?;
                    }
                    return Ok(Some(line));
                }
                Err(_) => {
                    if self.controller.stop_requested()
                        && (!self.seen_data || self.controller.is_finished())
                    {
                        debug!("Stop requested, no longer waiting for producer output");
                        return self.finish().await;
                    }
                }
            }
        }
    }
}
