//! Chat session - one agent's view of the dashboard
//!
//! Wires the history loader, live event router, command gateway and
//! activation controller to a shared pair of stores, and reports every
//! visible change as a [`ChatEvent`] on an unbounded channel.

use crate::activation::{ActivationController, ActivationOutcome, ActivationState};
use crate::command_gateway::CommandGateway;
use crate::config::{CredentialProvider, EndpointSelector};
use crate::error::CommandError;
use crate::event_router::{LiveEventRouter, SummarySink};
use crate::events::ChatEvent;
use crate::history_loader::HistoryLoader;
use crate::remote::RemoteChatApi;
use crate::transport::{ConnectionState, PushTransport, TransportStatus};
use crate::{SharedConversationStore, SharedMessageStore};
use chatiq_store::{Conversation, ConversationId, ConversationStore, Message, MessageStore};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the session has seen of the push channel so far
#[derive(Debug, Default)]
struct LinkState {
    last: Option<TransportStatus>,
    /// Set by a disconnect, taken by the next connect
    lost: bool,
    connections: u64,
}

pub struct ChatSession {
    controller: ActivationController,
    gateway: CommandGateway,
    router: Arc<LiveEventRouter>,
    endpoint: EndpointSelector,
    store: SharedMessageStore,
    conversations: SharedConversationStore,
    events: UnboundedSender<ChatEvent>,
    link: Mutex<LinkState>,
}

impl ChatSession {
    /// Create a session and the receiver for its events
    pub fn new(
        api: Arc<dyn RemoteChatApi>,
        transport: Arc<dyn PushTransport>,
        endpoint: EndpointSelector,
        credentials: Arc<dyn CredentialProvider>,
        site_id: impl Into<String>,
    ) -> (Self, UnboundedReceiver<ChatEvent>) {
        let (events, event_receiver) = mpsc::unbounded();
        let store: SharedMessageStore = Arc::new(Mutex::new(MessageStore::new()));
        let conversations: SharedConversationStore =
            Arc::new(Mutex::new(ConversationStore::new()));

        let router = Arc::new(LiveEventRouter::new(Arc::clone(&transport)));
        router.bind_summaries(summary_sink(Arc::clone(&conversations), events.clone()));
        let loader = Arc::new(HistoryLoader::new(
            Arc::clone(&api),
            endpoint.clone(),
            Arc::clone(&credentials),
        ));
        let controller = ActivationController::new(
            loader,
            Arc::clone(&router),
            Arc::clone(&store),
            Arc::clone(&conversations),
            events.clone(),
        );
        let gateway = CommandGateway::new(
            api,
            transport,
            endpoint.clone(),
            credentials,
            site_id,
            Arc::clone(&store),
            Arc::clone(&conversations),
        );

        let session = Self {
            controller,
            gateway,
            router,
            endpoint,
            store,
            conversations,
            events,
            link: Mutex::new(LinkState::default()),
        };
        (session, event_receiver)
    }

    /// Open a conversation: subscribe, load history, mark as read
    pub async fn open(&self, conversation_id: ConversationId) -> ActivationOutcome {
        self.controller.select(conversation_id).await
    }

    /// Close the open conversation without selecting another
    pub fn close(&self, conversation_id: &ConversationId) -> bool {
        self.controller.close(conversation_id)
    }

    /// Send an agent message; it appears in the timeline once echoed back
    pub fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<(), CommandError> {
        self.gateway.send(conversation_id, text)
    }

    /// Clear a conversation's history
    ///
    /// No confirmation is asked here; callers guard destructive actions.
    pub async fn clear_history(&self, conversation_id: &ConversationId) -> Result<(), CommandError> {
        match self.gateway.clear_history(conversation_id).await {
            Ok(()) => {
                self.controller.history_cleared(conversation_id);
                self.emit(ChatEvent::HistoryCleared {
                    conversation_id: conversation_id.clone(),
                });
                self.emit(ChatEvent::TimelineUpdated {
                    conversation_id: conversation_id.clone(),
                    len: 0,
                });
                self.emit_summary(conversation_id);
                Ok(())
            }
            Err(error) => {
                self.emit_failure(conversation_id, &error);
                Err(error)
            }
        }
    }

    /// Delete a conversation; closes it first if it is open
    pub async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), CommandError> {
        match self.gateway.delete_conversation(conversation_id).await {
            Ok(()) => {
                self.controller.close(conversation_id);
                self.emit(ChatEvent::ConversationDeleted {
                    conversation_id: conversation_id.clone(),
                });
                Ok(())
            }
            Err(error) => {
                self.emit_failure(conversation_id, &error);
                Err(error)
            }
        }
    }

    /// React to a push channel state change
    ///
    /// A disconnect invalidates every live subscription. The first
    /// `Connected` after a disconnect re-activates the open conversation.
    pub async fn handle_transport_status(&self, status: TransportStatus) {
        self.apply_link_change(status, None).await;
    }

    /// React to a push channel snapshot that carries a connection count
    ///
    /// Snapshots may skip intermediate states. A `Connected` snapshot whose
    /// count moved past an earlier connection is treated as a reconnect even
    /// when the disconnect in between was never observed.
    pub async fn handle_connection_state(&self, state: ConnectionState) {
        self.apply_link_change(state.status, Some(state.connections)).await;
    }

    async fn apply_link_change(&self, status: TransportStatus, connections: Option<u64>) {
        let (changed, invalidate, recover) = {
            let mut link = self.link.lock();
            let changed = link.last.replace(status) != Some(status);
            let mut invalidate = status == TransportStatus::Disconnected && changed;

            match (status, connections) {
                (TransportStatus::Disconnected, _) => link.lost = true,
                (TransportStatus::Connected, Some(count)) if count > link.connections => {
                    if link.connections > 0 && !link.lost {
                        debug!("Missed disconnect before connection {}", count);
                        invalidate = true;
                        link.lost = true;
                    }
                    link.connections = count;
                }
                _ => {}
            }

            let recover = status == TransportStatus::Connected && std::mem::take(&mut link.lost);
            (changed, invalidate, recover)
        };

        if changed {
            self.emit(ChatEvent::ConnectionChanged { status });
        }
        if invalidate {
            let dropped = self.router.invalidate_all();
            warn!(
                "Push channel disconnected, {} subscription(s) dropped",
                dropped.len()
            );
        }
        if recover {
            info!("Push channel reconnected");
            self.controller.recover().await;
        }
    }

    /// Register or rename a conversation in the list
    pub fn upsert_conversation(
        &self,
        conversation_id: ConversationId,
        visitor_id: impl Into<String>,
        display_name: impl Into<String>,
    ) {
        self.conversations
            .lock()
            .upsert(conversation_id.clone(), visitor_id, display_name);
        self.emit_summary(&conversation_id);
    }

    /// Ordered timeline of a conversation
    pub fn timeline(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.store.lock().snapshot(conversation_id)
    }

    /// Conversation summaries in first-seen order
    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.lock().list()
    }

    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.conversations.lock().get(conversation_id).cloned()
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.controller.current()
    }

    pub fn activation_state(&self) -> ActivationState {
        self.controller.state()
    }

    /// Selector for the API base URL; switching it affects the next request
    pub fn endpoint(&self) -> &EndpointSelector {
        &self.endpoint
    }

    fn emit_summary(&self, conversation_id: &ConversationId) {
        let summary = self.conversations.lock().get(conversation_id).cloned();
        if let Some(conversation) = summary {
            self.emit(ChatEvent::ConversationUpdated { conversation });
        }
    }

    fn emit_failure(&self, conversation_id: &ConversationId, error: &CommandError) {
        self.emit(ChatEvent::CommandFailed {
            conversation_id: conversation_id.clone(),
            error: error.clone(),
        });
    }

    fn emit(&self, event: ChatEvent) {
        if let Err(e) = self.events.unbounded_send(event) {
            tracing::error!("Failed to send event to receiver: {}", e);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.router.unbind_summaries();
    }
}

/// Update summaries for messages addressed to conversations that are not open
fn summary_sink(
    conversations: SharedConversationStore,
    events: UnboundedSender<ChatEvent>,
) -> SummarySink {
    Arc::new(move |message: Message| {
        let summary = {
            let mut conversations = conversations.lock();
            if !conversations.record_message(&message, false) {
                return;
            }
            conversations.get(&message.conversation_id).cloned()
        };

        if let Some(conversation) = summary {
            let _ = events.unbounded_send(ChatEvent::ConversationUpdated { conversation });
        }
    })
}
