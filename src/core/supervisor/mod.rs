//! Runs one sqlmap subprocess per invocation and folds its stream and exit
//! events into a single [`ProcessOutcome`].
//!
//! Each invocation is a small state machine. It stays `Running` until either
//! the process has exited *and* both output streams have closed, or the
//! timeout/cancellation fires. Stream readers only forward chunks; they never
//! decide completion.

use crate::core::invocation::ArgumentVector;
use crate::core::resolver::ExecutableLocation;
use async_trait::async_trait;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long stream readers may keep draining after the process was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Windows `CREATE_NO_WINDOW`: keep the scanner from opening a console window.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Terminal result of one subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited and both streams closed. `exit_code` is `-1` when
    /// the process was terminated by a signal.
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The process could not be started or supervised.
    SpawnFailed { reason: String },
    /// The timeout elapsed; the process was killed.
    TimedOut {
        limit: Duration,
        stdout: String,
        stderr: String,
    },
    /// The invocation was cancelled; the process was killed.
    Cancelled { stdout: String, stderr: String },
}

impl ProcessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Completed { .. } => "completed",
            ProcessOutcome::SpawnFailed { .. } => "spawn_failed",
            ProcessOutcome::TimedOut { .. } => "timed_out",
            ProcessOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Per-invocation limits. Neither is set by default, so a run may block for
/// as long as the scanner does.
#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl RunLimits {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }
}

/// Seam for starting the scanner, so callers can be exercised against
/// simulated outcomes.
#[async_trait]
pub trait ScanRunner: Send + Sync + 'static {
    async fn run(
        &self,
        location: &ExecutableLocation,
        argv: &ArgumentVector,
        limits: RunLimits,
    ) -> ProcessOutcome;
}

/// Runs the real executable with tokio's process support.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScanRunner;

#[async_trait]
impl ScanRunner for TokioScanRunner {
    async fn run(
        &self,
        location: &ExecutableLocation,
        argv: &ArgumentVector,
        limits: RunLimits,
    ) -> ProcessOutcome {
        supervise(location, argv, limits).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug)]
enum StreamEvent {
    Chunk(StreamKind, Vec<u8>),
    Closed(StreamKind),
}

#[derive(Debug, Clone, Copy)]
enum Interrupt {
    TimedOut(Duration),
    Cancelled,
}

/// Owned capture buffers for one invocation.
#[derive(Debug, Default)]
struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_open: bool,
    stderr_open: bool,
}

impl Capture {
    fn open() -> Self {
        Self {
            stdout_open: true,
            stderr_open: true,
            ..Self::default()
        }
    }

    fn is_drained(&self) -> bool {
        !self.stdout_open && !self.stderr_open
    }

    fn apply(&mut self, event: Option<StreamEvent>) {
        match event {
            Some(StreamEvent::Chunk(kind, bytes)) => {
                tracing::debug!(
                    stream = %kind,
                    "{}",
                    String::from_utf8_lossy(&bytes).trim_end()
                );
                match kind {
                    StreamKind::Stdout => self.stdout.extend_from_slice(&bytes),
                    StreamKind::Stderr => self.stderr.extend_from_slice(&bytes),
                }
            }
            Some(StreamEvent::Closed(StreamKind::Stdout)) => self.stdout_open = false,
            Some(StreamEvent::Closed(StreamKind::Stderr)) => self.stderr_open = false,
            None => {
                self.stdout_open = false;
                self.stderr_open = false;
            }
        }
    }

    fn into_text(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

fn build_command(location: &ExecutableLocation, argv: &ArgumentVector) -> Command {
    let mut command = Command::new(&location.path);
    command
        .args(argv.as_slice())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a launcher script and everything it starts can
    // be killed together.
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);
    command
}

fn forward<R>(reader: Option<R>, kind: StreamKind, tx: mpsc::UnboundedSender<StreamEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Some(mut reader) = reader {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(StreamEvent::Chunk(kind, buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(stream = %kind, "failed to read scanner output: {}", err);
                        break;
                    }
                }
            }
        }
        let _ = tx.send(StreamEvent::Closed(kind));
    });
}

/// Kill the scanner's whole process group, then the direct child if it is
/// still running. `group` is the child's pid taken at spawn time; it stays
/// the group id after the child itself has been reaped.
async fn terminate(child: &mut Child, group: Option<u32>, exited: bool) {
    #[cfg(not(unix))]
    let _ = group;
    #[cfg(unix)]
    if let Some(pid) = group {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!("failed to signal sqlmap process group: {}", err);
        }
    }
    if !exited {
        if let Err(err) = child.kill().await {
            tracing::warn!("failed to kill sqlmap: {}", err);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            tracing::warn!(signal, "sqlmap terminated by signal");
        }
    }
    status.code().unwrap_or(-1)
}

async fn supervise(
    location: &ExecutableLocation,
    argv: &ArgumentVector,
    limits: RunLimits,
) -> ProcessOutcome {
    tracing::info!(
        "executing: {} {}",
        location.path.display(),
        argv.display()
    );

    let mut child = match build_command(location, argv).spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::error!(path = %location.path.display(), "failed to start sqlmap: {}", err);
            return ProcessOutcome::SpawnFailed {
                reason: format!("{}: {}", location.path.display(), err),
            };
        }
    };

    let group = child.id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    forward(child.stdout.take(), StreamKind::Stdout, tx.clone());
    forward(child.stderr.take(), StreamKind::Stderr, tx);

    let deadline = async {
        match limits.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut capture = Capture::open();
    let mut exited: Option<ExitStatus> = None;

    let interrupt = loop {
        if let Some(status) = exited {
            if capture.is_drained() {
                let code = exit_code(status);
                tracing::info!(exit_code = code, "sqlmap finished");
                let (stdout, stderr) = capture.into_text();
                return ProcessOutcome::Completed {
                    exit_code: code,
                    stdout,
                    stderr,
                };
            }
        }

        tokio::select! {
            event = rx.recv(), if !capture.is_drained() => capture.apply(event),
            status = child.wait(), if exited.is_none() => match status {
                Ok(status) => exited = Some(status),
                Err(err) => {
                    tracing::error!("failed to wait for sqlmap: {}", err);
                    return ProcessOutcome::SpawnFailed {
                        reason: format!("failed to wait for sqlmap: {}", err),
                    };
                }
            },
            _ = &mut deadline => {
                break Interrupt::TimedOut(limits.timeout.unwrap_or_default());
            }
            _ = limits.cancel.cancelled() => break Interrupt::Cancelled,
        }
    };

    terminate(&mut child, group, exited.is_some()).await;

    let drained = tokio::time::timeout(DRAIN_GRACE, async {
        while !capture.is_drained() {
            capture.apply(rx.recv().await);
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("output streams still open after kill; returning partial output");
    }

    let (stdout, stderr) = capture.into_text();
    match interrupt {
        Interrupt::TimedOut(limit) => {
            tracing::warn!(
                "sqlmap killed after exceeding timeout of {}",
                humantime::format_duration(limit)
            );
            ProcessOutcome::TimedOut {
                limit,
                stdout,
                stderr,
            }
        }
        Interrupt::Cancelled => {
            tracing::warn!("sqlmap invocation cancelled");
            ProcessOutcome::Cancelled { stdout, stderr }
        }
    }
}
