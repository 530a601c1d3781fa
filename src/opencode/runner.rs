//! Spawning `opencode run` and turning its stdout into a stream of run signals

use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::events::{RunEvent, WireEvent};
use super::request::RunRequest;
use crate::subprocess::streaming::{
    JsonLineDecoder, LineBuffer, StreamSource, EVENT_CHANNEL_CAPACITY, READ_CHUNK_SIZE,
};
use crate::subprocess::{ExitStatus, ProcessError, TokioProcessRunner};

/// How long to wait for the stderr reader after the process exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long to keep reading stdout after the process exited
const STDOUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Terminal report of a run that actually executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    /// Last non-empty session id seen on any event
    pub session_id: Option<String>,
    pub exit_code: i32,
}

impl RunCompletion {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Everything a run reports, in order.
///
/// A stream ends with exactly one terminal item: `Completed` when the process
/// ran and exited, `Failed` when it could not be spawned or its output could
/// not be read. Nothing follows a terminal item.
#[derive(Debug)]
pub enum RunSignal {
    Event(RunEvent),
    /// One line of stderr
    Diagnostic(String),
    Completed(RunCompletion),
    Failed(ProcessError),
}

impl RunSignal {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunSignal::Completed(_) | RunSignal::Failed(_))
    }
}

/// Cloneable capability to terminate a running process
#[derive(Debug, Clone)]
pub struct AbortHandle {
    pid: Option<u32>,
    exited: Arc<AtomicBool>,
    requested: Arc<AtomicBool>,
}

impl AbortHandle {
    fn for_pid(pid: Option<u32>) -> Self {
        Self {
            pid,
            exited: Arc::new(AtomicBool::new(pid.is_none())),
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for a run that never started a process
    pub fn detached() -> Self {
        Self::for_pid(None)
    }

    /// Handle for a run driven in-process: `abort` only records the request,
    /// the driver polls [`was_requested`](Self::was_requested)
    pub fn cooperative() -> Self {
        Self {
            pid: None,
            exited: Arc::new(AtomicBool::new(false)),
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn was_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Send SIGTERM to the run's process group; repeated or late calls are no-ops
    pub fn abort(&self) {
        if self.is_finished() || self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pid) = self.pid {
            terminate_group(pid);
        }
    }
}

#[cfg(unix)]
fn terminate_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!("Process id {} out of range, cannot signal", pid);
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => tracing::debug!("Sent SIGTERM to process group {}", raw),
        Err(Errno::ESRCH) => tracing::trace!("Process group {} already gone", raw),
        Err(e) => tracing::warn!("Failed to signal process group {}: {}", raw, e),
    }
}

#[cfg(not(unix))]
fn terminate_group(pid: u32) {
    tracing::warn!("Aborting process {} is only supported on unix", pid);
}

/// A started run: an async stream of [`RunSignal`]s plus an abort capability
pub struct RunHandle {
    signals: ReceiverStream<RunSignal>,
    abort: AbortHandle,
}

impl RunHandle {
    pub fn new(receiver: mpsc::Receiver<RunSignal>, abort: AbortHandle) -> Self {
        Self {
            signals: ReceiverStream::new(receiver),
            abort,
        }
    }

    /// A handle whose only item is the given spawn failure
    pub fn failed(error: ProcessError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this send cannot fail
        let _ = tx.try_send(RunSignal::Failed(error));
        Self::new(rx, AbortHandle::detached())
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }
}

impl Stream for RunHandle {
    type Item = RunSignal;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.signals).poll_next(cx)
    }
}

/// Starts runs; the seam between the orchestrator and real processes
pub trait RunLauncher: Send + Sync {
    fn start(&self, request: RunRequest) -> RunHandle;
}

/// Launches the real opencode executable
#[derive(Debug, Clone)]
pub struct OpencodeRunner {
    binary: PathBuf,
}

impl OpencodeRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl RunLauncher for OpencodeRunner {
    /// Must be called from within a tokio runtime
    fn start(&self, request: RunRequest) -> RunHandle {
        let command = request.to_command(&self.binary);

        let mut child = match TokioProcessRunner::spawn_piped(&command) {
            Ok(child) => child,
            Err(e) => return RunHandle::failed(e),
        };

        let abort = AbortHandle::for_pid(child.id());
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::spawn(drive_run(child, stdout, stderr, tx, abort.clone()));

        RunHandle::new(rx, abort)
    }
}

/// Pump the child's output into the channel and finish with a terminal signal
async fn drive_run(
    mut child: Child,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    tx: mpsc::Sender<RunSignal>,
    abort: AbortHandle,
) {
    let stderr_task = stderr.map(|stderr| tokio::spawn(forward_diagnostics(stderr, tx.clone())));
    let mut reader = EventReader::new();

    let (outcome, exited) = match stdout {
        Some(stdout) => {
            let read = reader.read(stdout, &tx);
            tokio::pin!(read);
            tokio::select! {
                outcome = &mut read => (outcome, None),
                status = child.wait() => {
                    // Descendants of opencode can keep the pipe open after it exits
                    let drained = tokio::time::timeout(STDOUT_DRAIN_TIMEOUT, &mut read).await;
                    let outcome = match drained {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::debug!("stdout still open after exit, not waiting for it");
                            Ok(())
                        }
                    };
                    (outcome, Some(status))
                }
            }
        }
        None => (
            Err(ProcessError::Stream("stdout was not captured".to_string())),
            None,
        ),
    };

    if outcome.is_err() {
        // Nobody is reading its output any more
        let _ = child.start_kill();
    }
    let status = match exited {
        Some(status) => status,
        None => child.wait().await,
    };
    abort.mark_exited();

    let outcome = match outcome {
        Ok(()) => Ok(reader.finish(&tx).await),
        Err(e) => Err(e),
    };

    if let Some(mut task) = stderr_task {
        if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await.is_err() {
            tracing::debug!("stderr still open after exit, not waiting for it");
            // Nothing may follow the terminal signal
            task.abort();
            let _ = task.await;
        }
    }

    let terminal = match (outcome, status) {
        (Err(e), _) => RunSignal::Failed(e),
        (Ok(_), Err(e)) => RunSignal::Failed(ProcessError::Io(e)),
        (Ok(session_id), Ok(status)) => {
            let status = ExitStatus::from(status);
            tracing::debug!(?status, ?session_id, "opencode run finished");
            RunSignal::Completed(RunCompletion {
                session_id,
                exit_code: status.as_exit_code(),
            })
        }
    };
    let _ = tx.send(terminal).await;
}

/// Stdout decoding state; outlives a read that was cut short
struct EventReader {
    lines: LineBuffer,
    decoder: JsonLineDecoder<WireEvent>,
    /// Last session id reported by any event
    session_id: Option<String>,
}

impl EventReader {
    fn new() -> Self {
        Self {
            lines: LineBuffer::new(),
            decoder: JsonLineDecoder::new(),
            session_id: None,
        }
    }

    /// Read until EOF, emitting one event per complete JSON line
    async fn read<R>(
        &mut self,
        mut stdout: R,
        tx: &mpsc::Sender<RunSignal>,
    ) -> Result<(), ProcessError>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let read = stdout
                .read(&mut chunk)
                .await
                .map_err(|e| ProcessError::Stream(e.to_string()))?;
            if read == 0 {
                return Ok(());
            }
            for line in self.lines.push(&chunk[..read]) {
                self.emit(&line, tx).await;
            }
        }
    }

    /// Parse the trailing partial line, if any, and hand back the session id
    async fn finish(mut self, tx: &mpsc::Sender<RunSignal>) -> Option<String> {
        if let Some(line) = self.lines.finish() {
            self.emit(&line, tx).await;
        }
        tracing::trace!(
            decoded = self.decoder.decoded(),
            discarded = self.decoder.discarded(),
            "stdout closed"
        );
        self.session_id
    }

    async fn emit(&mut self, line: &str, tx: &mpsc::Sender<RunSignal>) {
        let Some(wire) = self.decoder.decode(line) else {
            return;
        };
        if let Some(id) = wire.session_id() {
            self.session_id = Some(id.to_string());
        }
        // A dropped receiver only means nobody renders this run; keep draining the pipe
        let _ = tx.send(RunSignal::Event(wire.into_event())).await;
    }
}

async fn forward_diagnostics(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<RunSignal>) {
    let mut reader = BufReader::new(stderr).lines();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(source = StreamSource::Stderr.as_str(), "{}", line);
                let _ = tx.send(RunSignal::Diagnostic(line)).await;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading stderr: {}", e);
                break;
            }
        }
    }
}
