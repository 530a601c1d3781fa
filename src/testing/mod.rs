//! Test support
//!
//! - [`fake_opencode`] - a throwaway directory that `/bin/sh` can run as if it
//!   were `opencode run`
//! - [`ScriptedLauncher`] - a [`RunLauncher`] that plays back scripted runs
//! - [`RecordingChannel`] - a [`ChatChannel`] that remembers every post and update

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

use crate::chat::{ChannelError, ChatChannel, MessageRef};
use crate::opencode::{
    AbortHandle, RunCompletion, RunEvent, RunHandle, RunLauncher, RunRequest, RunSignal,
};
use crate::render::Block;
use crate::session::ConversationId;
use crate::subprocess::streaming::EVENT_CHANNEL_CAPACITY;
use crate::subprocess::ProcessError;

/// Exit code reported by scripted runs that were aborted (128 + SIGTERM)
pub const ABORTED_EXIT_CODE: i32 = 143;

/// Shared ordering between launcher starts and channel operations
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Directory holding a `run` shell script.
///
/// Spawning [`binary`](Self::binary) with the directory as working dir makes
/// `/bin/sh run --format json ...` execute the script with opencode's argv.
pub struct FakeOpencode {
    dir: TempDir,
}

impl FakeOpencode {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn binary(&self) -> PathBuf {
        PathBuf::from("/bin/sh")
    }
}

pub fn fake_opencode(script: &str) -> FakeOpencode {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("run"), script).expect("Failed to write fake opencode script");
    FakeOpencode { dir }
}

enum Step {
    Signal(RunSignal),
    Sleep(Duration),
    Wait(Arc<Notify>),
}

/// A run played back by [`ScriptedLauncher`]
#[derive(Default)]
pub struct ScriptedRun {
    steps: Vec<Step>,
}

impl ScriptedRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: RunEvent) -> Self {
        self.steps.push(Step::Signal(RunSignal::Event(event)));
        self
    }

    pub fn text(self, text: &str) -> Self {
        self.event(RunEvent::TextDelta(text.to_string()))
    }

    pub fn diagnostic(mut self, line: &str) -> Self {
        self.steps.push(Step::Signal(RunSignal::Diagnostic(line.to_string())));
        self
    }

    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Sleep(duration));
        self
    }

    /// Pause until `gate` is notified (or the run is aborted)
    pub fn wait_for(mut self, gate: Arc<Notify>) -> Self {
        self.steps.push(Step::Wait(gate));
        self
    }

    pub fn completes(mut self, session_id: Option<&str>, exit_code: i32) -> Self {
        self.steps.push(Step::Signal(RunSignal::Completed(RunCompletion {
            session_id: session_id.map(str::to_string),
            exit_code,
        })));
        self
    }

    pub fn fails(mut self, error: ProcessError) -> Self {
        self.steps.push(Step::Signal(RunSignal::Failed(error)));
        self
    }
}

/// A run the launcher was asked to start
#[derive(Debug, Clone)]
pub struct StartedRun {
    pub request: RunRequest,
    pub seq: u64,
    pub abort: AbortHandle,
}

/// Plays back queued [`ScriptedRun`]s in order; once they run out every start
/// completes immediately with exit code 0
#[derive(Default)]
pub struct ScriptedLauncher {
    runs: Mutex<VecDeque<ScriptedRun>>,
    started: Mutex<Vec<StartedRun>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runs(runs: impl IntoIterator<Item = ScriptedRun>) -> Self {
        Self {
            runs: Mutex::new(runs.into_iter().collect()),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, run: ScriptedRun) {
        lock(&self.runs).push_back(run);
    }

    pub fn started(&self) -> Vec<StartedRun> {
        lock(&self.started).clone()
    }

    pub fn started_messages(&self) -> Vec<String> {
        lock(&self.started)
            .iter()
            .map(|run| run.request.message.clone())
            .collect()
    }
}

impl RunLauncher for ScriptedLauncher {
    fn start(&self, request: RunRequest) -> RunHandle {
        let abort = AbortHandle::cooperative();
        lock(&self.started).push(StartedRun {
            request,
            seq: next_seq(),
            abort: abort.clone(),
        });

        let run = lock(&self.runs)
            .pop_front()
            .unwrap_or_else(|| ScriptedRun::new().completes(None, 0));

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(play(run, tx, abort.clone()));
        RunHandle::new(rx, abort)
    }
}

async fn play(run: ScriptedRun, tx: mpsc::Sender<RunSignal>, abort: AbortHandle) {
    for step in run.steps {
        if abort.was_requested() {
            let _ = tx
                .send(RunSignal::Completed(RunCompletion {
                    session_id: None,
                    exit_code: ABORTED_EXIT_CODE,
                }))
                .await;
            break;
        }

        match step {
            Step::Signal(signal) => {
                let terminal = signal.is_terminal();
                if tx.send(signal).await.is_err() || terminal {
                    break;
                }
            }
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Wait(gate) => loop {
                tokio::select! {
                    _ = gate.notified() => break,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {
                        if abort.was_requested() {
                            break;
                        }
                    }
                }
            },
        }
    }
    abort.mark_exited();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Post,
    Update,
}

#[derive(Debug, Clone)]
pub struct RecordedOp {
    pub seq: u64,
    pub kind: OpKind,
    pub message: MessageRef,
    pub blocks: Vec<Block>,
}

/// In-memory [`ChatChannel`] that records every successful operation
#[derive(Default)]
pub struct RecordingChannel {
    ops: Mutex<Vec<RecordedOp>>,
    next_id: AtomicU64,
    failing_updates: AtomicUsize,
    rejected: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` updates as rate limited
    pub fn fail_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn ops(&self) -> Vec<RecordedOp> {
        lock(&self.ops).clone()
    }

    /// Messages posted in `thread`, oldest first
    pub fn messages_in(&self, thread: &ConversationId) -> Vec<MessageRef> {
        lock(&self.ops)
            .iter()
            .filter(|op| op.kind == OpKind::Post && &op.message.thread_id == thread)
            .map(|op| op.message.clone())
            .collect()
    }

    /// Latest content of a message
    pub fn current(&self, message: &MessageRef) -> Option<Vec<Block>> {
        lock(&self.ops)
            .iter()
            .rev()
            .find(|op| &op.message == message)
            .map(|op| op.blocks.clone())
    }

    /// Sequence number of the last operation on a message
    pub fn last_seq(&self, message: &MessageRef) -> Option<u64> {
        lock(&self.ops)
            .iter()
            .rev()
            .find(|op| &op.message == message)
            .map(|op| op.seq)
    }

    /// Latest text of every message in `thread`, joined per message
    pub fn thread_texts(&self, thread: &ConversationId) -> Vec<String> {
        self.messages_in(thread)
            .iter()
            .filter_map(|message| self.current(message))
            .map(|blocks| crate::render::to_plain_text(&blocks))
            .collect()
    }

    fn record(&self, kind: OpKind, message: MessageRef, blocks: &[Block]) {
        lock(&self.ops).push(RecordedOp {
            seq: next_seq(),
            kind,
            message,
            blocks: blocks.to_vec(),
        });
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn post_message(
        &self,
        thread: &ConversationId,
        blocks: &[Block],
    ) -> Result<MessageRef, ChannelError> {
        let message = MessageRef {
            thread_id: thread.clone(),
            message_id: format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        self.record(OpKind::Post, message.clone(), blocks);
        Ok(message)
    }

    async fn update_message(
        &self,
        message: &MessageRef,
        blocks: &[Block],
    ) -> Result<(), ChannelError> {
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(ChannelError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            });
        }

        self.record(OpKind::Update, message.clone(), blocks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripted_run_plays_in_order() {
        let launcher = ScriptedLauncher::with_runs([ScriptedRun::new()
            .event(RunEvent::StepStart)
            .text("hi")
            .completes(Some("ses_1"), 0)]);

        let mut handle = launcher.start(RunRequest::new("hello"));
        assert!(matches!(handle.next().await, Some(RunSignal::Event(RunEvent::StepStart))));
        assert!(matches!(handle.next().await, Some(RunSignal::Event(RunEvent::TextDelta(_)))));
        assert!(matches!(handle.next().await, Some(RunSignal::Completed(_))));
        assert!(handle.next().await.is_none());

        assert_eq!(launcher.started_messages(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_scripted_run_honours_abort() {
        let gate = Arc::new(Notify::new());
        let launcher = ScriptedLauncher::with_runs([ScriptedRun::new()
            .wait_for(gate)
            .completes(Some("never"), 0)]);

        let mut handle = launcher.start(RunRequest::new("slow"));
        handle.abort();

        match handle.next().await {
            Some(RunSignal::Completed(done)) => assert_eq!(done.exit_code, ABORTED_EXIT_CODE),
            other => panic!("expected aborted completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recording_channel_rejects_updates() {
        let channel = RecordingChannel::new();
        let thread = ConversationId::from("t");
        let message = channel.post_text(&thread, "first").await.unwrap();

        channel.fail_updates(1);
        assert!(channel.update_message(&message, &[Block::section("x")]).await.is_err());
        assert!(channel.update_message(&message, &[Block::section("y")]).await.is_ok());

        assert_eq!(channel.rejected(), 1);
        assert_eq!(channel.current(&message), Some(vec![Block::section("y")]));
        assert_eq!(channel.thread_texts(&thread), vec!["y"]);
    }
}
