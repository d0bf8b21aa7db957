//! Live event router - per-conversation push subscriptions
//!
//! The push channel announces a created message under several event names:
//!
//! - `chat:message`     - general chat channel
//! - `admin:message`    - echo of messages sent by agents
//! - `chat:new_message` - new-message notification channel
//!
//! All three carry the same logical event. The router binds a handler for
//! every alias when a conversation is activated and forwards each callback to
//! the conversation's dispatch function once. When the transport fires more
//! than one alias for the same message, the copies reach the Message Store,
//! whose id-based dedup keeps exactly one.
//!
//! # Subscription registry
//!
//! Registrations are recorded per conversation, so deactivating one
//! conversation unbinds exactly the handlers its activation bound and never
//! anything else.
//!
//! # Summaries
//!
//! A second, session-long set of bindings reports messages for conversations
//! without a live subscription to a [`SummarySink`]. These bindings are kept
//! apart from the per-conversation ones and survive [`LiveEventRouter::invalidate_all`],
//! so unread counts keep moving while no conversation is open.

use crate::transport::{EventHandler, HandlerId, PushTransport};
use chatiq_store::{ConversationId, Message};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// General chat channel
pub const CHAT_MESSAGE_EVENT: &str = "chat:message";

/// Agent message echo; also the event name used to send agent messages
pub const ADMIN_MESSAGE_EVENT: &str = "admin:message";

/// New-message notification channel
pub const NEW_MESSAGE_EVENT: &str = "chat:new_message";

/// Receives messages for the subscribed conversation
pub type Dispatch = Arc<dyn Fn(Message) + Send + Sync>;

/// Receives messages for conversations that have no live subscription
pub type SummarySink = Arc<dyn Fn(Message) + Send + Sync>;

/// Recognized aliases of the "message created" event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAlias {
    ChatMessage,
    AdminEcho,
    NewMessage,
}

struct AliasEntry {
    alias: EventAlias,
    event_name: &'static str,
    normalize: fn(&Value) -> Result<Message, serde_json::Error>,
}

const ALIAS_TABLE: [AliasEntry; 3] = [
    AliasEntry {
        alias: EventAlias::ChatMessage,
        event_name: CHAT_MESSAGE_EVENT,
        normalize: normalize_message,
    },
    AliasEntry {
        alias: EventAlias::AdminEcho,
        event_name: ADMIN_MESSAGE_EVENT,
        normalize: normalize_message,
    },
    AliasEntry {
        alias: EventAlias::NewMessage,
        event_name: NEW_MESSAGE_EVENT,
        normalize: normalize_message,
    },
];

impl EventAlias {
    pub const ALL: [EventAlias; 3] = [
        EventAlias::ChatMessage,
        EventAlias::AdminEcho,
        EventAlias::NewMessage,
    ];

    fn entry(self) -> &'static AliasEntry {
        match self {
            EventAlias::ChatMessage => &ALIAS_TABLE[0],
            EventAlias::AdminEcho => &ALIAS_TABLE[1],
            EventAlias::NewMessage => &ALIAS_TABLE[2],
        }
    }

    pub fn event_name(self) -> &'static str {
        self.entry().event_name
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        ALIAS_TABLE
            .iter()
            .find(|entry| entry.event_name == name)
            .map(|entry| entry.alias)
    }

    /// Turn an event payload into a message
    pub fn normalize(self, payload: &Value) -> Result<Message, serde_json::Error> {
        (self.entry().normalize)(payload)
    }
}

/// Accepts the bare message object or one wrapped as `{"message": {...}}`
fn normalize_message(payload: &Value) -> Result<Message, serde_json::Error> {
    match Message::deserialize(payload) {
        Ok(message) => Ok(message),
        Err(e) => match payload.get("message") {
            Some(inner) => Message::deserialize(inner),
            None => Err(e),
        },
    }
}

struct Subscription {
    bindings: Vec<(EventAlias, HandlerId)>,
}

type Subscriptions = Arc<Mutex<HashMap<ConversationId, Subscription>>>;

/// Binds push-channel handlers to the active conversation
pub struct LiveEventRouter {
    transport: Arc<dyn PushTransport>,
    subscriptions: Subscriptions,
    summary_bindings: Mutex<Option<Vec<(EventAlias, HandlerId)>>>,
}

impl LiveEventRouter {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            transport,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            summary_bindings: Mutex::new(None),
        }
    }

    /// Report messages for conversations without a live subscription to `sink`
    ///
    /// Binds one handler per alias until [`unbind_summaries`](Self::unbind_summaries).
    /// Returns false, binding nothing, if summaries are already bound.
    pub fn bind_summaries(&self, sink: SummarySink) -> bool {
        let mut summary_bindings = self.summary_bindings.lock();
        if summary_bindings.is_some() {
            debug!("Summary handlers already bound");
            return false;
        }

        let bindings = EventAlias::ALL
            .iter()
            .map(|&alias| {
                let handler = self.summary_handler_for(alias, Arc::clone(&sink));
                (alias, self.transport.on(alias.event_name(), handler))
            })
            .collect();
        *summary_bindings = Some(bindings);
        debug!("Bound summary handlers");
        true
    }

    /// Unbind the summary handlers; returns whether they were bound
    pub fn unbind_summaries(&self) -> bool {
        let Some(bindings) = self.summary_bindings.lock().take() else {
            return false;
        };

        for (alias, id) in bindings {
            self.transport.off(alias.event_name(), id);
        }
        debug!("Unbound summary handlers");
        true
    }

    /// Bind handlers for every alias
    ///
    /// Returns false, binding nothing, if the conversation already has a live
    /// subscription.
    pub fn activate(&self, conversation_id: &ConversationId, dispatch: Dispatch) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.contains_key(conversation_id) {
            debug!("Conversation {} already subscribed", conversation_id);
            return false;
        }

        let bindings = EventAlias::ALL
            .iter()
            .map(|&alias| {
                let handler = self.handler_for(alias, conversation_id.clone(), Arc::clone(&dispatch));
                (alias, self.transport.on(alias.event_name(), handler))
            })
            .collect();

        subscriptions.insert(conversation_id.clone(), Subscription { bindings });
        info!("Subscribed to live events for {}", conversation_id);
        true
    }

    /// Unbind the handlers bound by the matching `activate`
    ///
    /// Safe to call when nothing is bound; returns whether a subscription
    /// existed.
    pub fn deactivate(&self, conversation_id: &ConversationId) -> bool {
        let Some(subscription) = self.subscriptions.lock().remove(conversation_id) else {
            return false;
        };

        for (alias, id) in subscription.bindings {
            self.transport.off(alias.event_name(), id);
        }
        info!("Unsubscribed from live events for {}", conversation_id);
        true
    }

    /// Drop every subscription after the transport was torn down
    ///
    /// Returns the conversations that were subscribed.
    pub fn invalidate_all(&self) -> Vec<ConversationId> {
        let drained: Vec<(ConversationId, Subscription)> =
            self.subscriptions.lock().drain().collect();

        let mut conversations = Vec::with_capacity(drained.len());
        for (conversation_id, subscription) in drained {
            for (alias, id) in subscription.bindings {
                self.transport.off(alias.event_name(), id);
            }
            conversations.push(conversation_id);
        }
        if !conversations.is_empty() {
            warn!(
                "Invalidated {} live subscription(s) after transport reset",
                conversations.len()
            );
        }
        conversations
    }

    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.subscriptions.lock().contains_key(conversation_id)
    }

    pub fn active_subscriptions(&self) -> Vec<ConversationId> {
        self.subscriptions.lock().keys().cloned().collect()
    }

    fn handler_for(
        &self,
        alias: EventAlias,
        conversation_id: ConversationId,
        dispatch: Dispatch,
    ) -> EventHandler {
        Arc::new(move |payload: &Value| match alias.normalize(payload) {
            Ok(message) if message.conversation_id == conversation_id => dispatch(message),
            Ok(message) => debug!(
                "{} for {} kept out of {}",
                alias.event_name(),
                message.conversation_id,
                conversation_id
            ),
            Err(e) => warn!("Dropping malformed {} payload: {}", alias.event_name(), e),
        })
    }

    fn summary_handler_for(&self, alias: EventAlias, sink: SummarySink) -> EventHandler {
        let subscriptions = Arc::clone(&self.subscriptions);
        Arc::new(move |payload: &Value| {
            // Subscribed conversations are handled by their own dispatch
            if let Ok(message) = alias.normalize(payload) {
                if !subscriptions.lock().contains_key(&message.conversation_id) {
                    sink(message);
                }
            }
        })
    }
}
