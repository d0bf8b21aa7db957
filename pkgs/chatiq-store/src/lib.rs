//! ChatIQ Store - in-memory state for the agent dashboard
//!
//! This crate holds the state the dashboard renders from:
//!
//! - **MessageStore**: one ordered, deduplicated timeline per conversation
//! - **ConversationStore**: conversation list summaries (preview, last
//!   activity, unread count)
//!
//! Nothing here performs I/O. The `chatiq-sync` crate feeds both stores from
//! the history endpoint and the push channel.
//!
//! # Example Usage
//!
//! ```rust
//! use chatiq_store::{ConversationId, Message, MessageStore, Sender};
//!
//! let mut store = MessageStore::new();
//! let chat = ConversationId::new("chat-1");
//!
//! store.merge(&chat, vec![Message::new("1", "chat-1", Sender::Visitor, "hi")]);
//! store.append(&chat, Message::new("2", "chat-1", Sender::Agent, "hello"));
//! store.append(&chat, Message::new("2", "chat-1", Sender::Agent, "hello"));
//!
//! assert_eq!(store.get(&chat).len(), 2);
//! ```

pub mod conversation_store;
pub mod message;
pub mod message_store;

pub use conversation_store::{Conversation, ConversationStore, UNKNOWN_VISITOR_NAME};
pub use message::{ConversationId, Message, MessageId, Sender};
pub use message_store::{AppendOutcome, MessageStore};
