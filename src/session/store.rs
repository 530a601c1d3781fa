//! In-memory conversation state store

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::context::{ContextPatch, ConversationContext, ConversationId};

/// Maps conversation ids to their context.
///
/// Every operation takes the lock for its own duration only, so callers can
/// never carry a stale view across an await point. Use [`update`] for any
/// read-modify-write that must be atomic.
///
/// [`update`]: ConversationStore::update
#[derive(Debug, Default)]
pub struct ConversationStore {
    contexts: Mutex<HashMap<ConversationId, ConversationContext>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, ConversationContext>> {
        // The map stays consistent even if a holder panicked mid-closure
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &ConversationId) -> Option<ConversationContext> {
        self.lock().get(id).cloned()
    }

    /// Merge `patch` into the context, creating it with defaults if absent
    pub fn upsert(&self, id: &ConversationId, patch: ContextPatch) -> ConversationContext {
        let mut contexts = self.lock();
        let context = contexts.entry(id.clone()).or_default();
        context.apply(patch);
        context.clone()
    }

    /// Run `f` against the context under the lock, creating it if absent
    pub fn update<R>(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut ConversationContext) -> R,
    ) -> R {
        let mut contexts = self.lock();
        f(contexts.entry(id.clone()).or_default())
    }

    pub fn delete(&self, id: &ConversationId) -> Option<ConversationContext> {
        self.lock().remove(id)
    }

    /// Snapshot of every conversation, ordered by id
    pub fn list_all(&self) -> Vec<(ConversationId, ConversationContext)> {
        let mut all: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, ctx)| (id.clone(), ctx.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
