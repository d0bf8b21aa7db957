//! Conversation activation controller
//!
//! Switching the open conversation runs in a fixed order:
//!
//! 1. unsubscribe the previous conversation and evict its timeline
//! 2. start the history fetch for the new one
//! 3. subscribe the new conversation to live events
//!
//! Steps 2 and 3 both happen before the fetch is awaited, so live messages
//! arriving while history is in flight are buffered in the timeline and the
//! backlog is merged in front of them when the fetch resolves.
//!
//! # Generations
//!
//! Every fetch is tagged with a generation number. When a different
//! conversation is selected (or the current one is closed) before a fetch
//! resolves, the generation no longer matches and the result is dropped
//! without touching any timeline. A confirmed history clear does the same
//! for a fetch of the cleared conversation: its backlog predates the clear.

use crate::error::FetchError;
use crate::event_router::{Dispatch, LiveEventRouter};
use crate::events::ChatEvent;
use crate::history_loader::HistoryLoader;
use crate::{SharedConversationStore, SharedMessageStore};
use chatiq_store::{ConversationId, Message};
use futures::channel::mpsc::UnboundedSender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Which conversation is open, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    Activating {
        conversation_id: ConversationId,
        generation: u64,
    },
    Active {
        conversation_id: ConversationId,
        generation: u64,
    },
}

impl ActivationState {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            ActivationState::Idle => None,
            ActivationState::Activating {
                conversation_id, ..
            }
            | ActivationState::Active {
                conversation_id, ..
            } => Some(conversation_id),
        }
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            ActivationState::Idle => None,
            ActivationState::Activating { generation, .. }
            | ActivationState::Active { generation, .. } => Some(*generation),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ActivationState::Active { .. })
    }
}

/// Result of a `select` or `recover`
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// History merged (or degraded to empty) and the conversation is open
    Activated {
        conversation_id: ConversationId,
        timeline_len: usize,
        fetch_error: Option<FetchError>,
    },
    /// The conversation was already open or opening
    AlreadyActive,
    /// Another selection, a close or a history clear happened before the
    /// fetch resolved
    Superseded,
}

struct ControllerInner {
    state: Mutex<ActivationState>,
    next_generation: AtomicU64,
    loader: Arc<HistoryLoader>,
    router: Arc<LiveEventRouter>,
    store: SharedMessageStore,
    conversations: SharedConversationStore,
    events: UnboundedSender<ChatEvent>,
}

type PendingFetch = JoinHandle<Result<Vec<Message>, FetchError>>;

/// Owns the "which conversation is open" state
#[derive(Clone)]
pub struct ActivationController {
    inner: Arc<ControllerInner>,
}

impl ActivationController {
    pub fn new(
        loader: Arc<HistoryLoader>,
        router: Arc<LiveEventRouter>,
        store: SharedMessageStore,
        conversations: SharedConversationStore,
        events: UnboundedSender<ChatEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ActivationState::Idle),
                next_generation: AtomicU64::new(0),
                loader,
                router,
                store,
                conversations,
                events,
            }),
        }
    }

    pub fn state(&self) -> ActivationState {
        self.inner.state.lock().clone()
    }

    /// The open (or opening) conversation
    pub fn current(&self) -> Option<ConversationId> {
        self.inner.state.lock().conversation_id().cloned()
    }

    /// Open a conversation
    ///
    /// Resolves once this selection's history fetch has settled. Selecting
    /// the conversation that is already open or opening does nothing.
    pub async fn select(&self, conversation_id: ConversationId) -> ActivationOutcome {
        let (generation, fetch) = {
            let mut state = self.inner.state.lock();
            if state.conversation_id() == Some(&conversation_id) {
                debug!("Conversation {} already selected", conversation_id);
                return ActivationOutcome::AlreadyActive;
            }

            if let Some(previous) = state.conversation_id().cloned() {
                self.inner.router.deactivate(&previous);
                self.inner.store.lock().remove(&previous);
                debug!("Evicted timeline of {}", previous);
            }

            self.begin(&mut state, &conversation_id)
        };

        info!("Activating conversation {}", conversation_id);
        self.emit(ChatEvent::ActivationStarted {
            conversation_id: conversation_id.clone(),
        });

        let result = join_fetch(fetch).await;
        self.complete(&conversation_id, generation, result)
    }

    /// Close a conversation if it is the open one
    ///
    /// Unsubscribes it, evicts its timeline and returns to `Idle`. A fetch
    /// still in flight for it is discarded when it resolves.
    pub fn close(&self, conversation_id: &ConversationId) -> bool {
        let mut state = self.inner.state.lock();
        if state.conversation_id() != Some(conversation_id) {
            return false;
        }

        self.inner.router.deactivate(conversation_id);
        self.inner.store.lock().remove(conversation_id);
        *state = ActivationState::Idle;
        info!("Closed conversation {}", conversation_id);
        true
    }

    /// Apply a confirmed remote clear to the open conversation
    ///
    /// The timeline is emptied under the state lock. If its history fetch is
    /// still in flight, the conversation becomes active with an empty backlog
    /// and the fetch result is discarded when it resolves. Returns whether a
    /// pending fetch was dropped.
    pub fn history_cleared(&self, conversation_id: &ConversationId) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.store.lock().clear(conversation_id);

        let activating = matches!(
            &*state,
            ActivationState::Activating { conversation_id: current, .. } if current == conversation_id
        );
        if !activating {
            return false;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = ActivationState::Active {
            conversation_id: conversation_id.clone(),
            generation,
        };
        drop(state);

        self.inner.conversations.lock().mark_as_read(conversation_id);
        info!(
            "History of {} cleared while loading, pending fetch dropped",
            conversation_id
        );
        true
    }

    /// Re-run activation for the open conversation after a reconnect
    ///
    /// The subscription is bound again and the backlog is re-merged into the
    /// existing timeline, picking up anything missed while disconnected.
    /// Returns `None` when no conversation is open.
    pub async fn recover(&self) -> Option<ActivationOutcome> {
        let (conversation_id, generation, fetch) = {
            let mut state = self.inner.state.lock();
            let conversation_id = state.conversation_id()?.clone();
            self.inner.router.deactivate(&conversation_id);
            let (generation, fetch) = self.begin(&mut state, &conversation_id);
            (conversation_id, generation, fetch)
        };

        info!("Recovering conversation {} after reconnect", conversation_id);
        self.emit(ChatEvent::ActivationStarted {
            conversation_id: conversation_id.clone(),
        });

        let result = join_fetch(fetch).await;
        Some(self.complete(&conversation_id, generation, result))
    }

    /// Tag a new generation, start the fetch, then subscribe
    fn begin(
        &self,
        state: &mut ActivationState,
        conversation_id: &ConversationId,
    ) -> (u64, PendingFetch) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = ActivationState::Activating {
            conversation_id: conversation_id.clone(),
            generation,
        };

        let loader = Arc::clone(&self.inner.loader);
        let fetch_id = conversation_id.clone();
        let fetch = tokio::spawn(async move { loader.load(&fetch_id).await });

        self.inner
            .router
            .activate(conversation_id, self.dispatch_for(conversation_id));

        (generation, fetch)
    }

    fn complete(
        &self,
        conversation_id: &ConversationId,
        generation: u64,
        result: Result<Vec<Message>, FetchError>,
    ) -> ActivationOutcome {
        let mut state = self.inner.state.lock();
        if state.generation() != Some(generation) {
            debug!(
                "Discarding stale history for {} (generation {})",
                conversation_id, generation
            );
            return ActivationOutcome::Superseded;
        }

        let (backlog, fetch_error) = match result {
            Ok(backlog) => (backlog, None),
            Err(e) => {
                warn!(
                    "History for {} unavailable, showing live messages only: {}",
                    conversation_id, e
                );
                (Vec::new(), Some(e))
            }
        };

        let timeline_len = self.inner.store.lock().merge(conversation_id, backlog).len();
        self.inner.conversations.lock().mark_as_read(conversation_id);
        *state = ActivationState::Active {
            conversation_id: conversation_id.clone(),
            generation,
        };
        drop(state);

        info!(
            "Conversation {} active with {} message(s)",
            conversation_id, timeline_len
        );
        self.emit(ChatEvent::TimelineUpdated {
            conversation_id: conversation_id.clone(),
            len: timeline_len,
        });
        if let Some(error) = &fetch_error {
            self.emit(ChatEvent::HistoryDegraded {
                conversation_id: conversation_id.clone(),
                error: error.clone(),
            });
        }

        ActivationOutcome::Activated {
            conversation_id: conversation_id.clone(),
            timeline_len,
            fetch_error,
        }
    }

    /// Route live messages for `conversation_id` into its timeline
    fn dispatch_for(&self, conversation_id: &ConversationId) -> Dispatch {
        let conversation_id = conversation_id.clone();
        let store = Arc::clone(&self.inner.store);
        let conversations = Arc::clone(&self.inner.conversations);
        let events = self.inner.events.clone();

        Arc::new(move |message: Message| {
            let outcome = store.lock().append(&conversation_id, message.clone());
            if !outcome.is_inserted() {
                trace!("Message {} not appended: {:?}", message.id, outcome);
                return;
            }

            let summary = {
                let mut conversations = conversations.lock();
                conversations.record_message(&message, true);
                conversations.get(&message.conversation_id).cloned()
            };

            let _ = events.unbounded_send(ChatEvent::MessageReceived { message });
            if let Some(conversation) = summary {
                let _ = events.unbounded_send(ChatEvent::ConversationUpdated { conversation });
            }
        })
    }

    fn emit(&self, event: ChatEvent) {
        if let Err(e) = self.inner.events.unbounded_send(event) {
            trace!("Event receiver dropped: {}", e);
        }
    }
}

async fn join_fetch(fetch: PendingFetch) -> Result<Vec<Message>, FetchError> {
    match fetch.await {
        Ok(result) => result,
        Err(e) => Err(FetchError::Unreachable(format!("history task failed: {}", e))),
    }
}
