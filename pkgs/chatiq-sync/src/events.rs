//! Session events consumed by rendering

use crate::error::{CommandError, FetchError};
use crate::transport::TransportStatus;
use chatiq_store::{Conversation, ConversationId, Message};

/// Notification emitted whenever visible state changes
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A conversation was selected and its history is loading
    ActivationStarted { conversation_id: ConversationId },
    /// The timeline was rebuilt (history merged or cleared)
    TimelineUpdated {
        conversation_id: ConversationId,
        len: usize,
    },
    /// A new message reached the open conversation's timeline
    MessageReceived { message: Message },
    /// A conversation summary changed
    ConversationUpdated { conversation: Conversation },
    /// History could not be loaded; the timeline shows live messages only
    HistoryDegraded {
        conversation_id: ConversationId,
        error: FetchError,
    },
    HistoryCleared { conversation_id: ConversationId },
    ConversationDeleted { conversation_id: ConversationId },
    /// A clear or delete failed; local state is unchanged
    CommandFailed {
        conversation_id: ConversationId,
        error: CommandError,
    },
    ConnectionChanged { status: TransportStatus },
}
