//! Per-conversation state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

/// Chat thread identifier; the unit of session continuity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Conversation settings carried by a request and applied when it starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub working_context: Option<PathBuf>,
    /// `Some(None)` clears the override
    pub model_override: Option<Option<String>>,
    pub agent_override: Option<Option<String>>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `ctx`. Moving to another directory drops the continuation
    /// handle: opencode sessions belong to the project they were started in.
    pub fn apply_to(&self, ctx: &mut ConversationContext) {
        if let Some(dir) = &self.working_context {
            if ctx.working_context.as_ref() != Some(dir) {
                ctx.working_context = Some(dir.clone());
                ctx.continuation_handle = None;
            }
        }
        if let Some(model) = &self.model_override {
            ctx.model_override = model.clone();
        }
        if let Some(agent) = &self.agent_override {
            ctx.agent_override = agent.clone();
        }
    }
}

/// A message waiting to be run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub message: String,
    /// Slash command to run instead of a plain prompt
    pub command: Option<String>,
    pub files: Vec<PathBuf>,
    pub settings: SettingsChange,
    pub received_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
            files: Vec::new(),
            settings: SettingsChange::default(),
            received_at: Utc::now(),
        }
    }

    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    pub fn with_settings(mut self, settings: SettingsChange) -> Self {
        self.settings = settings;
        self
    }
}

/// Where a conversation is in its run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Busy,
    /// Busy with more requests waiting behind the current run
    Draining { queued: usize },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Busy => write!(f, "busy"),
            RunPhase::Draining { queued } => write!(f, "busy, {} queued", queued),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    /// opencode session id; `None` until a run reports one
    pub continuation_handle: Option<String>,
    pub working_context: Option<PathBuf>,
    pub model_override: Option<String>,
    pub agent_override: Option<String>,
    pub busy: bool,
    pub pending_queue: VecDeque<PendingRequest>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            continuation_handle: None,
            working_context: None,
            model_override: None,
            agent_override: None,
            busy: false,
            pending_queue: VecDeque::new(),
            created_at: now,
            last_active: now,
        }
    }
}

impl ConversationContext {
    pub fn phase(&self) -> RunPhase {
        match (self.busy, self.pending_queue.len()) {
            (false, _) => RunPhase::Idle,
            (true, 0) => RunPhase::Busy,
            (true, queued) => RunPhase::Draining { queued },
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(handle) = patch.continuation_handle {
            self.continuation_handle = handle;
        }
        if let Some(dir) = patch.working_context {
            self.working_context = dir;
        }
        if let Some(model) = patch.model_override {
            self.model_override = model;
        }
        if let Some(agent) = patch.agent_override {
            self.agent_override = agent;
        }
        if let Some(busy) = patch.busy {
            self.busy = busy;
        }
        self.pending_queue.extend(patch.enqueue);
        self.touch();
    }
}

/// Partial update merged over a context.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub continuation_handle: Option<Option<String>>,
    pub working_context: Option<Option<PathBuf>>,
    pub model_override: Option<Option<String>>,
    pub agent_override: Option<Option<String>>,
    pub busy: Option<bool>,
    /// Appended to the back of the pending queue
    pub enqueue: Option<PendingRequest>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn continuation_handle(mut self, handle: Option<String>) -> Self {
        self.continuation_handle = Some(handle);
        self
    }

    pub fn working_context(mut self, dir: Option<PathBuf>) -> Self {
        self.working_context = Some(dir);
        self
    }

    pub fn model_override(mut self, model: Option<String>) -> Self {
        self.model_override = Some(model);
        self
    }

    pub fn agent_override(mut self, agent: Option<String>) -> Self {
        self.agent_override = Some(agent);
        self
    }

    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = Some(busy);
        self
    }

    pub fn enqueue(mut self, request: PendingRequest) -> Self {
        self.enqueue = Some(request);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
