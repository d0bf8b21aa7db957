//! Command gateway - send, clear and delete against the remote system
//!
//! # Send
//!
//! Sending is fire-and-forget. The agent's message is not inserted locally:
//! the server broadcasts it back on the push channel (`admin:message`) and it
//! reaches the timeline through the live event router like any visitor
//! message. The Message Store's id dedup makes a second local copy harmless,
//! but none is made.
//!
//! # Clear / delete
//!
//! Destructive commands change remote state first. Local state (timeline,
//! conversation summary) is only touched after a 2xx answer. Any other
//! outcome leaves local state as it was and is reported as a
//! [`CommandError`]. Nothing is retried.

use crate::config::{CredentialProvider, EndpointSelector, RequestContext};
use crate::error::{CommandError, CommandKind};
use crate::event_router::ADMIN_MESSAGE_EVENT;
use crate::remote::{RemoteChatApi, RemoteError, RemoteResponse};
use crate::transport::PushTransport;
use crate::{SharedConversationStore, SharedMessageStore};
use chatiq_store::ConversationId;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payload of an agent-authored message on the push channel
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    site_id: &'a str,
}

/// Issues commands and mirrors confirmed outcomes locally
pub struct CommandGateway {
    api: Arc<dyn RemoteChatApi>,
    transport: Arc<dyn PushTransport>,
    endpoint: EndpointSelector,
    credentials: Arc<dyn CredentialProvider>,
    site_id: String,
    store: SharedMessageStore,
    conversations: SharedConversationStore,
}

impl CommandGateway {
    pub fn new(
        api: Arc<dyn RemoteChatApi>,
        transport: Arc<dyn PushTransport>,
        endpoint: EndpointSelector,
        credentials: Arc<dyn CredentialProvider>,
        site_id: impl Into<String>,
        store: SharedMessageStore,
        conversations: SharedConversationStore,
    ) -> Self {
        Self {
            api,
            transport,
            endpoint,
            credentials,
            site_id: site_id.into(),
            store,
            conversations,
        }
    }

    /// Emit an agent message on the push channel
    ///
    /// Text that is blank after trimming is ignored; otherwise the text is
    /// sent as typed. Only a transport that cannot take the frame fails.
    pub fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<(), CommandError> {
        if text.trim().is_empty() {
            debug!("Ignoring blank message for {}", conversation_id);
            return Ok(());
        }

        let payload = serde_json::to_value(OutgoingMessage {
            chat_id: conversation_id.as_str(),
            text,
            site_id: &self.site_id,
        })
        .map_err(|e| CommandError::Transport(e.into()))?;

        self.transport.emit(ADMIN_MESSAGE_EVENT, payload)?;
        debug!("Sent agent message to {}", conversation_id);
        Ok(())
    }

    /// Clear a conversation's history remotely, then locally
    pub async fn clear_history(&self, conversation_id: &ConversationId) -> Result<(), CommandError> {
        let ctx = self.context();
        let result = self.api.clear_history(&ctx, conversation_id).await;
        confirm(CommandKind::ClearHistory, conversation_id, result)?;

        self.store.lock().clear(conversation_id);
        self.conversations.lock().clear_preview(conversation_id);
        info!("Cleared history of {}", conversation_id);
        Ok(())
    }

    /// Delete a conversation remotely, then drop its timeline and summary
    pub async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), CommandError> {
        let ctx = self.context();
        let result = self.api.delete_conversation(&ctx, conversation_id).await;
        confirm(CommandKind::DeleteConversation, conversation_id, result)?;

        self.store.lock().remove(conversation_id);
        self.conversations.lock().remove(conversation_id);
        info!("Deleted conversation {}", conversation_id);
        Ok(())
    }

    fn context(&self) -> RequestContext {
        RequestContext::resolve(&self.endpoint, self.credentials.as_ref())
    }
}

/// Map a remote outcome onto the command error taxonomy
fn confirm(
    operation: CommandKind,
    conversation_id: &ConversationId,
    result: Result<RemoteResponse, RemoteError>,
) -> Result<(), CommandError> {
    let error = match result {
        Ok(response) if response.is_success() => return Ok(()),
        Ok(response) if response.status == 404 => {
            CommandError::NotImplementedRemote { operation }
        }
        Ok(response) => CommandError::Rejected {
            operation,
            status: response.status,
            reason: response.reason,
        },
        Err(e) => CommandError::NetworkUnreachable {
            operation,
            reason: e.to_string(),
        },
    };

    warn!("Failed to {} {}: {}", operation, conversation_id, error);
    Err(error)
}
