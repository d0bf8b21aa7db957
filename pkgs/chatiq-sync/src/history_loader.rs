//! History loader - fetches a conversation's backlog on activation
//!
//! One request per activation, no retry. A broken history endpoint must never
//! keep the live channel from working, so every failure is reported as a
//! [`FetchError`] that the activation controller turns into an empty backlog.

use crate::config::{CredentialProvider, EndpointSelector, RequestContext};
use crate::error::FetchError;
use crate::remote::RemoteChatApi;
use chatiq_store::{ConversationId, Message};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Loads the authoritative backlog of a conversation
pub struct HistoryLoader {
    api: Arc<dyn RemoteChatApi>,
    endpoint: EndpointSelector,
    credentials: Arc<dyn CredentialProvider>,
}

impl HistoryLoader {
    pub fn new(
        api: Arc<dyn RemoteChatApi>,
        endpoint: EndpointSelector,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            api,
            endpoint,
            credentials,
        }
    }

    /// Fetch the backlog
    ///
    /// The endpoint and token are resolved for this request only.
    pub async fn load(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, FetchError> {
        let ctx = RequestContext::resolve(&self.endpoint, self.credentials.as_ref());
        debug!(
            "Loading history for {} from {}",
            conversation_id, ctx.base_url
        );

        let response = self
            .api
            .fetch_history(&ctx, conversation_id)
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
            });
        }

        parse_backlog(conversation_id, &response.body)
    }
}

/// Parse a history payload into messages
///
/// The payload must be a JSON list. Entries that are not message-shaped are
/// skipped; entries without a `chatId` are attributed to the requested
/// conversation.
pub fn parse_backlog(
    conversation_id: &ConversationId,
    body: &str,
) -> Result<Vec<Message>, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(FetchError::Malformed(format!(
            "expected a list of messages, got {}",
            json_kind(&value)
        )));
    };

    let total = items.len();
    let messages: Vec<Message> = items
        .into_iter()
        .filter_map(|mut item| {
            if let Value::Object(fields) = &mut item {
                fields
                    .entry("chatId")
                    .or_insert_with(|| Value::String(conversation_id.to_string()));
            }
            match serde_json::from_value::<Message>(item) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping malformed history entry for {}: {}", conversation_id, e);
                    None
                }
            }
        })
        .collect();

    debug!(
        "Parsed {} of {} history entries for {}",
        messages.len(),
        total,
        conversation_id
    );
    Ok(messages)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
