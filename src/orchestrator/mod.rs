//! Per-conversation run serialization
//!
//! Each conversation has at most one worker task. The worker runs the request
//! that started it, then keeps popping the conversation's pending queue until
//! it is empty. The busy check-and-set, the queue push and the final
//! pop-or-go-idle all happen inside one [`ConversationStore::update`] call, so
//! a request either lands in the queue of a live worker or starts a new one.

pub mod publisher;
pub mod run;

pub use publisher::Publisher;
pub use run::{collect, final_render, RunOutcome};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::chat::ChatChannel;
use crate::opencode::{AbortHandle, RunLauncher, RunRequest};
use crate::render::RenderLimits;
use crate::session::{ContextPatch, ConversationId, ConversationStore, PendingRequest};

pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Minimum spacing of progress updates for one run
    pub publish_interval: Duration,
    pub limits: RenderLimits,
    /// Working directory for conversations that never set one
    pub default_dir: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            limits: RenderLimits::default(),
            default_dir: None,
        }
    }
}

/// What `submit` did with a request
#[derive(Debug)]
pub enum Submission {
    /// A worker was started; it finishes when the conversation goes idle
    Started(JoinHandle<()>),
    /// The conversation is busy; the request waits at this 1-based position
    Queued { position: usize },
}

struct Inner {
    store: Arc<ConversationStore>,
    launcher: Arc<dyn RunLauncher>,
    channel: Arc<dyn ChatChannel>,
    settings: OrchestratorSettings,
    active: Mutex<HashMap<ConversationId, AbortHandle>>,
    workers: watch::Sender<usize>,
    shutting_down: AtomicBool,
}

/// Cheap to clone; all clones share state
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        launcher: Arc<dyn RunLauncher>,
        channel: Arc<dyn ChatChannel>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (workers, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                store,
                launcher,
                channel,
                settings,
                active: Mutex::new(HashMap::new()),
                workers,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.inner.store
    }

    pub fn channel(&self) -> &Arc<dyn ChatChannel> {
        &self.inner.channel
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Run `request` now, or queue it behind the conversation's current run
    pub fn submit(&self, id: &ConversationId, request: PendingRequest) -> Submission {
        let claimed = self.inner.store.update(id, |ctx| {
            ctx.touch();
            if ctx.busy {
                ctx.pending_queue.push_back(request);
                Err(ctx.pending_queue.len())
            } else {
                ctx.busy = true;
                Ok(request)
            }
        });

        match claimed {
            Ok(request) => {
                self.inner.workers.send_modify(|n| *n += 1);
                let inner = Arc::clone(&self.inner);
                let id = id.clone();
                Submission::Started(tokio::spawn(async move { inner.work(id, request).await }))
            }
            Err(position) => {
                tracing::info!(conversation = %id, position, "Conversation busy, request queued");
                Submission::Queued { position }
            }
        }
    }

    /// Number of runs with a live process
    pub fn active_runs(&self) -> usize {
        self.inner.active().len()
    }

    /// Signal every active run to terminate; returns how many were signalled
    pub fn abort_all(&self) -> usize {
        let active = self.inner.active();
        for (id, handle) in active.iter() {
            tracing::info!(conversation = %id, "Aborting run");
            handle.abort();
        }
        active.len()
    }

    /// Abort everything and stop draining queues; queued requests are dropped
    pub fn shutdown(&self) -> usize {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.abort_all()
    }

    /// Resolve once no conversation has a worker
    pub async fn wait_idle(&self) {
        let mut workers = self.inner.workers.subscribe();
        // The sender lives in `inner`, so this cannot observe a closed channel
        let _ = workers.wait_for(|n| *n == 0).await;
    }
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashMap<ConversationId, AbortHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn work(self: Arc<Self>, id: ConversationId, first: PendingRequest) {
        let mut next = Some(first);
        while let Some(request) = next.take() {
            self.run_one(&id, request).await;

            // Pop under the same lock that clears busy: a request queued while
            // we were finishing is picked up here, never stranded
            let shutting_down = self.shutting_down.load(Ordering::SeqCst);
            next = self.store.update(&id, |ctx| {
                if shutting_down && !ctx.pending_queue.is_empty() {
                    tracing::warn!(
                        conversation = %id,
                        dropped = ctx.pending_queue.len(),
                        "Shutting down, dropping queued requests"
                    );
                    ctx.pending_queue.clear();
                }
                let popped = ctx.pending_queue.pop_front();
                if popped.is_none() {
                    ctx.busy = false;
                }
                ctx.touch();
                popped
            });
        }

        tracing::debug!(conversation = %id, "Conversation idle");
        self.workers.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn run_one(&self, id: &ConversationId, request: PendingRequest) {
        let span = tracing::info_span!("run", conversation = %id, run_id = %Uuid::new_v4());
        self.execute(id, request).instrument(span).await
    }

    fn build_request(&self, id: &ConversationId, request: PendingRequest) -> RunRequest {
        // Settings are applied and read at start time, never from a snapshot
        // taken at submit
        let ctx = self.store.update(id, |ctx| {
            request.settings.apply_to(ctx);
            ctx.clone()
        });
        let working_dir = ctx
            .working_context
            .or_else(|| self.settings.default_dir.clone());

        RunRequest::new(request.message)
            .with_session(ctx.continuation_handle)
            .with_working_dir(working_dir)
            .with_model(ctx.model_override)
            .with_agent(ctx.agent_override)
            .with_command(request.command)
            .with_files(request.files)
    }

    async fn execute(&self, id: &ConversationId, request: PendingRequest) {
        let run_request = self.build_request(id, request);
        tracing::info!(
            session = run_request.session_id.as_deref().unwrap_or("new"),
            dir = ?run_request.working_dir,
            "Starting opencode run"
        );

        let handle = self.launcher.start(run_request);
        self.active().insert(id.clone(), handle.abort_handle());

        let mut publisher = Publisher::new(self.channel.as_ref(), id);
        let (outcome, accumulator, diagnostics) = run::drive(
            handle,
            &mut publisher,
            self.settings.limits,
            self.settings.publish_interval,
        )
        .await;

        self.active().remove(id);

        if let Some(session_id) = outcome.session_id() {
            self.store.upsert(
                id,
                ContextPatch::new().continuation_handle(Some(session_id.to_string())),
            );
        }

        match &outcome {
            RunOutcome::Completed(done) if done.success() => {
                tracing::info!(steps = accumulator.step_count(), "Run completed")
            }
            RunOutcome::Completed(done) => {
                tracing::warn!(exit_code = done.exit_code, "opencode exited with non-zero status")
            }
            RunOutcome::Failed(message) => tracing::error!("Run failed: {}", message),
        }

        let blocks = final_render(&outcome, &accumulator, &diagnostics, &self.settings.limits);
        publisher.publish_final(&blocks).await;
    }
}
