//! Process-wide conversation state store.
//!
//! Per-conversation records live behind their own `tokio::sync::Mutex`, guarded by
//! an outer `std::sync::Mutex` over the lookup table. Creating or fetching the
//! per-conversation lock is synchronous and cheap; the per-conversation mutex then
//! guards the actual read-modify-write sequence, keeping the synchronous
//! bookkeeping separate from the async state access it protects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::{ClarificationType, ConversationState};

/// A handle to a single conversation's lock, held for the duration of one turn.
///
/// Wraps an owned guard (`lock_owned`) rather than borrowing from the store, so it
/// can be held across awaits without tying its lifetime to a `&self` borrow.
pub struct ConversationGuard {
    guard: OwnedMutexGuard<ConversationState>,
}

impl std::ops::Deref for ConversationGuard {
    type Target = ConversationState;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::ops::DerefMut for ConversationGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// In-memory, process-wide store of `ConversationState`, keyed by `conversationId`.
///
/// Concurrent requests for the same conversation are serialized: `lock` acquires
/// that conversation's logical lock before any state read-modify-write sequence.
/// Requests for different conversations proceed independently. No state survives
/// a process restart (per spec non-goals); durability is delegated.
#[derive(Default)]
pub struct ConversationStateStore {
    conversations: StdMutex<HashMap<String, Arc<AsyncMutex<ConversationState>>>>,
}

impl ConversationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the per-conversation lock, creating a fresh record on first access.
    pub async fn lock(&self, conversation_id: &str) -> ConversationGuard {
        let entry = {
            let mut conversations = self
                .conversations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            conversations
                .entry(conversation_id.to_string())
                .or_insert_with(|| {
                    Arc::new(AsyncMutex::new(ConversationState::new(
                        conversation_id,
                        Utc::now(),
                    )))
                })
                .clone()
        };

        let guard = entry.lock_owned().await;
        ConversationGuard { guard }
    }

    /// Returns whether a clarification of the given type has already been asked
    /// for this conversation.
    pub async fn has_asked_clarification(
        &self,
        conversation_id: &str,
        clarification: ClarificationType,
    ) -> bool {
        self.lock(conversation_id).await.context.has_asked(clarification)
    }

    /// Marks a clarification type as asked for this conversation.
    pub async fn mark_clarification_asked(
        &self,
        conversation_id: &str,
        clarification: ClarificationType,
    ) {
        let mut state = self.lock(conversation_id).await;
        state.context.mark_asked(clarification);
        state.last_updated = Utc::now();
    }

    /// Returns the number of conversations currently tracked. Test/diagnostic use.
    pub fn len(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
