//! Lifecycle controller for the load-test producer process

use crate::constants::{PRODUCER_INVOCATIONS, STDERR_CHUNK_SIZE, STOP_GRACE_PERIOD};
use crate::errors::{ErrorContext, LoadwatchError, Result};
use crate::source::lines::PolledLines;

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Line stream over the producer's stdout
pub type ProducerLines = PolledLines<BufReader<ChildStdout>>;

/// Lifecycle of the supervised producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NotStarted,
    Running,
    StopRequested,
    /// Exited on its own or after the interrupt
    Terminated,
    /// Needed a forced kill after the grace period
    ForceKilled,
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Terminated | ControllerState::ForceKilled)
    }
}

/// One way of launching the producer; run arguments are appended to `argv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    argv: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a user supplied command line on whitespace
    pub fn from_command_line(command: &str) -> Self {
        Self::new(command.split_whitespace())
    }

    /// Built-in strategies: installed binary first, then a source run
    pub fn builtin() -> Vec<Self> {
        PRODUCER_INVOCATIONS.iter().map(|argv| Self::new(argv.iter().copied())).collect()
    }

    fn with_args(&self, args: &[String]) -> Vec<String> {
        self.argv.iter().chain(args).cloned().collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

struct RunningChild {
    child: Child,
    stderr_drain: JoinHandle<()>,
}

struct Inner {
    invocations: Vec<Invocation>,
    grace_period: Duration,
    stopping: AtomicBool,
    interrupts_sent: AtomicUsize,
    state: watch::Sender<ControllerState>,
    running: Mutex<Option<RunningChild>>,
}

/// Launches the producer, streams its output and stops it exactly once.
///
/// Cloning yields another handle to the same process; `stop` may be called from
/// any handle, any number of times, concurrently.
#[derive(Clone)]
pub struct ProcessController {
    inner: Arc<Inner>,
}

impl Default for ProcessController {
    fn default() -> Self {
        Self::new(Invocation::builtin())
    }
}

impl fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessController")
            .field("invocations", &self.inner.invocations)
            .field("state", &self.state())
            .finish()
    }
}

impl ProcessController {
    pub fn new(invocations: Vec<Invocation>) -> Self {
        Self::with_grace_period(invocations, STOP_GRACE_PERIOD)
    }

    /// Controller waiting `grace_period` between interrupt and forced kill
    pub fn with_grace_period(invocations: Vec<Invocation>, grace_period: Duration) -> Self {
        let (state, _) = watch::channel(ControllerState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                invocations,
                grace_period,
                stopping: AtomicBool::new(false),
                interrupts_sent: AtomicUsize::new(0),
                state,
                running: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state.borrow()
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.stopping.load(Ordering::Acquire)
    }

    /// The process is gone (or was never launched) and will not produce more output
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Number of interrupt signals delivered so far
    pub fn interrupts_sent(&self) -> usize {
        self.inner.interrupts_sent.load(Ordering::Relaxed)
    }

    /// Launch the producer with `args` and return its stdout as a line stream.
    ///
    /// Invocation strategies are tried in order; a strategy whose program does not
    /// exist falls through to the next one, any other spawn error is fatal.
    /// Child stderr is drained in the background into `stderr_sink` (a temporary
    /// file when `None`) and mirrored to our own stderr.
    pub async fn start(
        &self,
        args: &[String],
        stdout_sink: Option<&Path>,
        stderr_sink: Option<&Path>,
    ) -> Result<ProducerLines> {
        let mut running = self.inner.running.lock().await;
        if self.stop_requested() {
            return Err(LoadwatchError::process(
                "stop was requested before the producer was launched",
            ));
        }
        if self.state() != ControllerState::NotStarted {
            return Err(LoadwatchError::process("producer was already launched"));
        }

        let stdout_file = match stdout_sink {
            Some(path) => Some(
                File::create(path)
                    .await
                    .with_process_context(&format!("cannot create {}", path.display()))?,
            ),
            None => None,
        };
        let stderr_file = match stderr_sink {
            Some(path) => File::create(path)
                .await
                .with_process_context(&format!("cannot create {}", path.display()))?,
            None => File::from_std(tempfile::tempfile()?),
        };

        let mut child = self.spawn_first(args)?;
        let stdout = child
            .stdout
            .take()
            .with_process_context("producer stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .with_process_context("producer stderr was not captured")?;

        let stderr_drain = tokio::spawn(drain_stderr(stderr, stderr_file));
        *running = Some(RunningChild {
            child,
            stderr_drain,
        });
        self.inner.state.send_replace(ControllerState::Running);

        let mut lines = PolledLines::new(BufReader::new(stdout), self.clone());
        if let Some(file) = stdout_file {
            lines = lines.with_sink(file);
        }
        Ok(lines)
    }

    fn spawn_first(&self, args: &[String]) -> Result<Child> {
        for invocation in &self.inner.invocations {
            let argv = invocation.with_args(args);
            let Some((program, rest)) = argv.split_first() else {
                continue;
            };

            let spawned = Command::new(program)
                .args(rest)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn();

            match spawned {
                Ok(child) => {
                    info!(
                        "Launched producer: {} (PID {})",
                        argv.join(" "),
                        child.id().unwrap_or_default()
                    );
                    return Ok(child);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Producer strategy '{}' not available: {}", invocation, e);
                }
                Err(e) => {
                    return Err(LoadwatchError::launch(format!(
                        "failed to invoke '{}': {}",
                        argv.join(" "),
                        e
                    )));
                }
            }
        }

        let tried: Vec<String> = self
            .inner
            .invocations
            .iter()
            .map(|inv| inv.with_args(args).join(" "))
            .collect();
        error!("Failed to invoke any of: {}", tried.join(" | "));
        Err(LoadwatchError::launch(format!(
            "failed to invoke any of: {}",
            tried.join(" | ")
        )))
    }

    /// Stop the producer: interrupt, wait out the grace period, then kill.
    ///
    /// Only the first caller performs the sequence. Every other caller waits until
    /// it has finished, so on return the process is never running.
    pub async fn stop(&self) -> Result<()> {
        let first = self
            .inner
            .stopping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !first {
            let mut state = self.inner.state.subscribe();
            state
                .wait_for(ControllerState::is_terminal)
                .await
                .with_process_context("controller state channel closed")?;
            return Ok(());
        }

        let mut running = self.inner.running.lock().await;
        let Some(RunningChild {
            mut child,
            stderr_drain,
        }) = running.take()
        else {
            debug!("Stop requested before the producer was launched");
            self.inner.state.send_replace(ControllerState::Terminated);
            return Ok(());
        };

        self.inner.state.send_replace(ControllerState::StopRequested);
        let outcome = self.terminate(&mut child).await;
        self.inner.state.send_replace(match &outcome {
            Ok(state) => *state,
            Err(_) => ControllerState::Terminated,
        });

        // Keep whatever diagnostics the producer wrote on its way out
        if timeout(self.inner.grace_period, stderr_drain).await.is_err() {
            warn!("Producer stderr still open after exit, abandoning it");
        }

        outcome.map(|_| ())
    }

    /// Ask for a stop without waiting for it; usable from synchronous callbacks
    pub fn request_stop(&self) {
        if self.stop_requested() {
            return;
        }
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.stop().await {
                error!("Failed to stop producer: {}", e);
            }
        });
    }

    async fn terminate(&self, child: &mut Child) -> Result<ControllerState> {
        if let Some(status) = child.try_wait()? {
            info!("Producer already exited ({})", status);
            return Ok(ControllerState::Terminated);
        }

        self.interrupt(child)?;

        match timeout(self.inner.grace_period, child.wait()).await {
            Ok(status) => {
                info!("Producer exited after interrupt ({})", status?);
                Ok(ControllerState::Terminated)
            }
            Err(_) => {
                warn!(
                    "Producer still running {:?} after interrupt, killing it",
                    self.inner.grace_period
                );
                if child.try_wait()?.is_none() {
                    child.start_kill()?;
                }
                let status = child.wait().await?;
                info!("Producer killed ({})", status);
                Ok(ControllerState::ForceKilled)
            }
        }
    }

    #[cfg(unix)]
    fn interrupt(&self, child: &mut Child) -> Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return Ok(());
        };
        kill(Pid::from_raw(pid as i32), Signal::SIGINT)
            .with_process_context(&format!("failed to interrupt producer (PID {})", pid))?;
        self.inner.interrupts_sent.fetch_add(1, Ordering::Relaxed);
        info!("Sent SIGINT to producer (PID {})", pid);
        Ok(())
    }

    #[cfg(not(unix))]
    fn interrupt(&self, child: &mut Child) -> Result<()> {
        // No interrupt signal to deliver; the grace wait still applies to the kill
        child.start_kill()?;
        self.inner.interrupts_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Copy child stderr into `sink` and onto our own stderr until the pipe closes
async fn drain_stderr(mut stderr: ChildStderr, mut sink: File) {
    let mut mirror = tokio::io::stderr();
    let mut buf = vec![0u8; STDERR_CHUNK_SIZE];

    loop {
        let n = match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read producer stderr: {}", e);
                break;
            }
        };
        if let Err(e) = sink.write_all(&buf[..n]).await {
            warn!("Failed to write producer stderr sink: {}", e);
        }
        let _ = mirror.write_all(&buf[..n]).await;
    }

    if let Err(e) = sink.flush().await {
        warn!("Failed to flush producer stderr sink: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::source::LineSource;
    use std::time::Instant;

    fn shell(script: &str) -> Invocation {
        Invocation::new(["sh", "-c", script])
    }

    fn missing() -> Invocation {
        Invocation::new(["loadwatch-test-no-such-producer"])
    }

    #[tokio::test]
    async fn test_falls_back_to_next_strategy() {
        let controller = ProcessController::new(vec![
            missing(),
            shell("echo s1,0,ApiRequest,h; echo s1,1,ApiRequest,h"),
        ]);
        let mut lines = controller.start(&[], None, None).await.unwrap();
        assert_eq!(controller.state(), ControllerState::Running);

        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["s1,0,ApiRequest,h", "s1,1,ApiRequest,h"]);

        controller.stop().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Terminated);
    }

    #[tokio::test]
    async fn test_launch_failure_when_nothing_runs() {
        let controller = ProcessController::new(vec![missing(), missing()]);
        let Err(err) = controller.start(&[], None, None).await else {
            panic!("launch succeeded without any runnable strategy");
        };
        assert!(matches!(err, LoadwatchError::Launch(_)));
        assert_eq!(controller.state(), ControllerState::NotStarted);
    }

    #[tokio::test]
    async fn test_no_signal_to_exited_process() {
        let controller = ProcessController::new(vec![shell("exit 0")]);
        let _lines = controller.start(&[], None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        controller.stop().await.unwrap();
        assert_eq!(controller.interrupts_sent(), 0);
        assert_eq!(controller.state(), ControllerState::Terminated);
    }

    #[tokio::test]
    async fn test_interrupt_stops_cooperative_process() {
        let controller = ProcessController::new(vec![Invocation::new(["sleep", "30"])]);
        let _lines = controller.start(&[], None, None).await.unwrap();

        let started = Instant::now();
        controller.stop().await.unwrap();
        assert!(started.elapsed() < STOP_GRACE_PERIOD);
        assert_eq!(controller.state(), ControllerState::Terminated);
        assert_eq!(controller.interrupts_sent(), 1);
    }

    #[tokio::test]
    async fn test_escalates_to_kill_when_interrupt_ignored() {
        let controller = ProcessController::with_grace_period(
            vec![shell("trap '' INT; exec sleep 30")],
            Duration::from_millis(300),
        );
        let _lines = controller.start(&[], None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        controller.stop().await.unwrap();
        assert_eq!(controller.state(), ControllerState::ForceKilled);
        assert_eq!(controller.interrupts_sent(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_stops_signal_once() {
        let controller = ProcessController::new(vec![Invocation::new(["sleep", "30"])]);
        let _lines = controller.start(&[], None, None).await.unwrap();
        let other = controller.clone();

        let (a, b, c) = tokio::join!(controller.stop(), other.stop(), controller.stop());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(controller.interrupts_sent(), 1);
        assert!(other.is_finished());

        controller.stop().await.unwrap();
        assert_eq!(controller.interrupts_sent(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_stops_escalate_once() {
        let controller = ProcessController::with_grace_period(
            vec![shell("trap '' INT; exec sleep 30")],
            Duration::from_millis(300),
        );
        let _lines = controller.start(&[], None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let other = controller.clone();

        let (a, b, c) = tokio::join!(controller.stop(), other.stop(), controller.stop());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(controller.state(), ControllerState::ForceKilled);
        assert_eq!(other.state(), ControllerState::ForceKilled);
        assert_eq!(controller.interrupts_sent(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let controller = ProcessController::new(vec![Invocation::new(["sleep", "30"])]);
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Terminated);

        assert!(controller.start(&[], None, None).await.is_err());
        assert_eq!(controller.interrupts_sent(), 0);
    }

    #[tokio::test]
    async fn test_request_stop_from_sync_context() {
        let controller = ProcessController::new(vec![Invocation::new(["sleep", "30"])]);
        let _lines = controller.start(&[], None, None).await.unwrap();

        controller.request_stop();
        controller.request_stop();
        let mut state = controller.inner.state.subscribe();
        timeout(Duration::from_secs(5), state.wait_for(ControllerState::is_terminal))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.interrupts_sent(), 1);
    }

    #[tokio::test]
    async fn test_output_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let stdout_path = dir.path().join("run.stdout");
        let stderr_path = dir.path().join("run.stderr");

        let controller = ProcessController::new(vec![shell(
            "echo 'connecting' >&2; echo s1,0,ApiRequest,h",
        )]);
        let mut lines = controller
            .start(&[], Some(&stdout_path), Some(&stderr_path))
            .await
            .unwrap();
        while lines.next_line().await.unwrap().is_some() {}
        controller.stop().await.unwrap();

        let stdout = std::fs::read_to_string(&stdout_path).unwrap();
        let stderr = std::fs::read_to_string(&stderr_path).unwrap();
        assert_eq!(stdout, "s1,0,ApiRequest,h\n");
        assert!(stderr.contains("connecting"));
    }

    #[tokio::test]
    async fn test_args_are_appended() {
        let controller = ProcessController::new(vec![Invocation::new(["echo", "s1,0"])]);
        let args = vec!["ApiRequest,h".to_string()];
        let mut lines = controller.start(&args, None, None).await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("s1,0 ApiRequest,h")
        );
        controller.stop().await.unwrap();
    }
}
