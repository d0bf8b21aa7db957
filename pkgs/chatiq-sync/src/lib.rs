//! ChatIQ Sync - real-time message synchronization for the agent dashboard
//!
//! This crate reconciles a one-shot history fetch with the continuous push
//! channel into one ordered, deduplicated timeline per conversation, and runs
//! destructive commands against the remote source of truth.
//!
//! # Components
//!
//! - **HistoryLoader**: fetches a conversation's backlog on activation
//! - **LiveEventRouter**: binds push-channel aliases for the open conversation
//! - **CommandGateway**: send, clear history, delete conversation
//! - **ActivationController**: switches the open conversation in a safe order
//! - **ChatSession**: wires the above to the stores and emits [`ChatEvent`]s
//!
//! # Seams
//!
//! - [`RemoteChatApi`]: history/clear/delete endpoints ([`HttpChatApi`])
//! - [`PushTransport`]: push channel ([`SocketTransport`], [`MemoryTransport`])
//! - [`CredentialProvider`]: bearer token source
//! - [`EndpointSelector`]: runtime-switchable API base URL
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chatiq_sync::{
//!     ChatSession, EndpointSelector, HttpChatApi, SocketTransport, StaticCredentials, SyncConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let api = Arc::new(HttpChatApi::new(config.request_timeout)?);
//! let transport = Arc::new(SocketTransport::connect(&config.socket_url, config.reconnect_delay)?);
//! let endpoint = EndpointSelector::new(&config.api_base_url)?;
//! let credentials = Arc::new(StaticCredentials::new(config.access_token.clone()));
//!
//! let (session, _events) = ChatSession::new(api, transport, endpoint, credentials, &config.site_id);
//! session.open("chat-1".into()).await;
//! session.send(&"chat-1".into(), "Hello! How can I help?")?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod command_gateway;
pub mod config;
pub mod error;
pub mod event_router;
pub mod events;
pub mod history_loader;
pub mod remote;
pub mod session;
pub mod transport;

use chatiq_store::{ConversationStore, MessageStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Message store shared between the controller, router callbacks and gateway
pub type SharedMessageStore = Arc<Mutex<MessageStore>>;

/// Conversation summaries shared the same way
pub type SharedConversationStore = Arc<Mutex<ConversationStore>>;

pub use activation::{ActivationController, ActivationOutcome, ActivationState};
pub use command_gateway::CommandGateway;
pub use config::{
    ApiTarget, CredentialProvider, EndpointSelector, RequestContext, StaticCredentials,
    SyncConfig, DEFAULT_SITE_ID, HOSTED_API_URL, HOSTED_SOCKET_URL, LOCAL_API_URL,
    PLACEHOLDER_TOKEN,
};
pub use error::{CommandError, CommandKind, ConfigError, FetchError, TransportError};
pub use event_router::{
    Dispatch, EventAlias, LiveEventRouter, SummarySink, ADMIN_MESSAGE_EVENT, CHAT_MESSAGE_EVENT,
    NEW_MESSAGE_EVENT,
};
pub use events::ChatEvent;
pub use history_loader::{parse_backlog, HistoryLoader};
pub use remote::{HttpChatApi, RemoteChatApi, RemoteError, RemoteResponse};
pub use session::ChatSession;
pub use transport::{
    ConnectionState, EventHandler, HandlerId, MemoryTransport, PushTransport, SocketTransport,
    TransportStatus,
};

pub use chatiq_store;
