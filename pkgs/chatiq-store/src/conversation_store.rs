//! Conversation store - summary metadata for the conversation list
//!
//! Only the active conversation keeps a full timeline in the
//! [`MessageStore`](crate::MessageStore). Every other conversation is tracked
//! here through its summary: last message preview, last activity time and
//! unread count.

use crate::message::{ConversationId, Message, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// How many recent message ids each summary remembers for dedup
const RECENT_IDS_CAPACITY: usize = 64;

/// Display name used for conversations first seen through a live event
pub const UNKNOWN_VISITOR_NAME: &str = "Visitor";

/// Conversation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub visitor_id: String,
    pub display_name: String,
    pub last_message_preview: Option<String>,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub unread_count: u32,
}

impl Conversation {
    pub fn new(
        id: impl Into<ConversationId>,
        visitor_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            visitor_id: visitor_id.into(),
            display_name: display_name.into(),
            last_message_preview: None,
            last_activity_time: None,
            unread_count: 0,
        }
    }
}

#[derive(Debug)]
struct Entry {
    conversation: Conversation,
    recent_ids: VecDeque<MessageId>,
}

impl Entry {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            recent_ids: VecDeque::with_capacity(RECENT_IDS_CAPACITY),
        }
    }

    /// Remember an id; false if it was already seen
    fn remember(&mut self, id: &MessageId) -> bool {
        if self.recent_ids.contains(id) {
            return false;
        }
        if self.recent_ids.len() == RECENT_IDS_CAPACITY {
            self.recent_ids.pop_front();
        }
        self.recent_ids.push_back(id.clone());
        true
    }
}

/// Conversation store - keeps list order stable (first seen first)
#[derive(Debug, Default)]
pub struct ConversationStore {
    entries: HashMap<ConversationId, Entry>,
    order: Vec<ConversationId>,
}

impl ConversationStore {
    /// Create an empty conversation store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a conversation's identity fields
    ///
    /// Summary fields (preview, activity, unread count) of an existing entry
    /// are preserved.
    pub fn upsert(
        &mut self,
        id: ConversationId,
        visitor_id: impl Into<String>,
        display_name: impl Into<String>,
    ) {
        let visitor_id = visitor_id.into();
        let display_name = display_name.into();

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.conversation.visitor_id = visitor_id;
            entry.conversation.display_name = display_name;
            return;
        }

        debug!("Tracking new conversation {}", id);
        self.order.push(id.clone());
        self.entries.insert(
            id.clone(),
            Entry::new(Conversation::new(id, visitor_id, display_name)),
        );
    }

    /// Get a single conversation by id
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.entries.get(id).map(|entry| &entry.conversation)
    }

    /// All conversations, in the order they were first seen
    pub fn list(&self) -> Vec<Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.conversation.clone())
            .collect()
    }

    /// Update the summary after a message arrived
    ///
    /// Unknown conversations are created on the fly. The unread count is only
    /// bumped when the conversation is not the one currently open. Returns
    /// false if this message id was already recorded.
    pub fn record_message(&mut self, message: &Message, active: bool) -> bool {
        let id = &message.conversation_id;
        if !self.entries.contains_key(id) {
            self.upsert(id.clone(), String::new(), UNKNOWN_VISITOR_NAME);
        }

        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if !entry.remember(&message.id) {
            return false;
        }

        let summary = &mut entry.conversation;
        summary.last_message_preview = Some(message.text.clone());
        summary.last_activity_time = Some(message.created_at);
        if !active {
            summary.unread_count += 1;
        }
        true
    }

    /// Reset the unread count
    pub fn mark_as_read(&mut self, id: &ConversationId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.conversation.unread_count = 0;
        }
    }

    /// Forget the preview after the history was cleared remotely
    pub fn clear_preview(&mut self, id: &ConversationId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.conversation.last_message_preview = None;
            entry.conversation.unread_count = 0;
            entry.recent_ids.clear();
        }
    }

    /// Delete a conversation; returns whether it existed
    pub fn remove(&mut self, id: &ConversationId) -> bool {
        let existed = self.entries.remove(id).is_some();
        if existed {
            self.order.retain(|known| known != id);
            info!("Removed conversation {}", id);
        }
        existed
    }

    /// Sum of unread counts across conversations
    pub fn unread_total(&self) -> u32 {
        self.entries
            .values()
            .map(|entry| entry.conversation.unread_count)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
