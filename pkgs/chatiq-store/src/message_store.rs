//! Message store - in-memory, per-conversation message timelines
//!
//! Each conversation owns one timeline. A timeline is append-only for live
//! arrivals and is only rebuilt by [`MessageStore::merge`], which runs once per
//! activation with the history backlog.
//!
//! # Ordering
//!
//! Arrival order is the ordering rule. `created_at` is never used to reorder,
//! because display clocks are not monotonic across clients.
//!
//! # Deduplication
//!
//! Messages are unique by id within a timeline. The same message may arrive
//! through the history fetch and through several push-channel aliases; every
//! copy after the first is dropped.

use crate::message::{ConversationId, Message, MessageId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Result of appending a live message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Message was placed at the tail of the timeline
    Inserted,
    /// A message with the same id is already in the timeline
    Duplicate,
    /// Message belongs to a different conversation and was not stored
    Misrouted,
}

impl AppendOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, AppendOutcome::Inserted)
    }
}

#[derive(Debug, Default, Clone)]
struct Timeline {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    fn push(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// Message store - owns every message timeline
///
/// The store itself is not synchronized; the sync layer keeps it behind a
/// mutex so that operations on one timeline never interleave.
#[derive(Debug, Default)]
pub struct MessageStore {
    timelines: HashMap<ConversationId, Timeline>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a timeline with the history backlog
    ///
    /// The backlog is deduplicated (first occurrence wins) and keeps its
    /// order. Messages already buffered in the timeline, i.e. live arrivals
    /// that beat the history fetch, are appended after the backlog unless the
    /// backlog already contains their id.
    pub fn merge(&mut self, conversation_id: &ConversationId, backlog: Vec<Message>) -> &[Message] {
        let buffered = self
            .timelines
            .remove(conversation_id)
            .map(|timeline| timeline.messages)
            .unwrap_or_default();

        let mut timeline = Timeline::default();
        let mut dropped = 0usize;

        for message in backlog {
            if &message.conversation_id != conversation_id {
                warn!(
                    "Ignoring backlog message {} addressed to conversation {}",
                    message.id, message.conversation_id
                );
                continue;
            }
            if !timeline.push(message) {
                dropped += 1;
            }
        }

        let backlog_len = timeline.messages.len();
        for message in buffered {
            if !timeline.push(message) {
                dropped += 1;
            }
        }

        debug!(
            "Merged conversation {}: {} backlog, {} buffered, {} duplicates dropped",
            conversation_id,
            backlog_len,
            timeline.messages.len() - backlog_len,
            dropped
        );

        &self
            .timelines
            .entry(conversation_id.clone())
            .or_insert(timeline)
            .messages
    }

    /// Append a live message at the tail of its timeline
    pub fn append(&mut self, conversation_id: &ConversationId, message: Message) -> AppendOutcome {
        if &message.conversation_id != conversation_id {
            warn!(
                "Refusing to append message {} for {} to conversation {}",
                message.id, message.conversation_id, conversation_id
            );
            return AppendOutcome::Misrouted;
        }

        let timeline = self.timelines.entry(conversation_id.clone()).or_default();
        let id = message.id.clone();
        if timeline.push(message) {
            debug!("Appended message {} to {}", id, conversation_id);
            AppendOutcome::Inserted
        } else {
            debug!("Dropped duplicate message {} for {}", id, conversation_id);
            AppendOutcome::Duplicate
        }
    }

    /// Empty one conversation's timeline
    pub fn clear(&mut self, conversation_id: &ConversationId) {
        if let Some(timeline) = self.timelines.get_mut(conversation_id) {
            timeline.messages.clear();
            timeline.ids.clear();
        }
    }

    /// Current timeline of a conversation, empty if unknown
    pub fn get(&self, conversation_id: &ConversationId) -> &[Message] {
        self.timelines
            .get(conversation_id)
            .map(|timeline| timeline.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Owned copy of a timeline, for handing out of a lock
    pub fn snapshot(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.get(conversation_id).to_vec()
    }

    /// Drop a timeline entirely; returns whether one existed
    pub fn remove(&mut self, conversation_id: &ConversationId) -> bool {
        self.timelines.remove(conversation_id).is_some()
    }

    pub fn contains(&self, conversation_id: &ConversationId, message_id: &MessageId) -> bool {
        self.timelines
            .get(conversation_id)
            .is_some_and(|timeline| timeline.ids.contains(message_id))
    }

    pub fn len(&self, conversation_id: &ConversationId) -> usize {
        self.get(conversation_id).len()
    }

    pub fn is_empty(&self, conversation_id: &ConversationId) -> bool {
        self.len(conversation_id) == 0
    }

    /// Number of conversations holding a timeline
    pub fn conversation_count(&self) -> usize {
        self.timelines.len()
    }
}
