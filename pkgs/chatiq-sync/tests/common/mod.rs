//! Shared fixtures for chatiq-sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chatiq_sync::chatiq_store::{ConversationId, Message, MessageId, Sender};
use chatiq_sync::{
    ChatEvent, ChatSession, EndpointSelector, MemoryTransport, RemoteChatApi, RemoteError,
    RemoteResponse, RequestContext, StaticCredentials,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    History,
    Clear,
    Delete,
}

/// A request as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub conversation_id: ConversationId,
    pub base_url: String,
    pub bearer: String,
}

type Scripted = Result<RemoteResponse, RemoteError>;

/// Scriptable `RemoteChatApi`
///
/// Unscripted history requests answer `200 []`, unscripted clear and delete
/// requests answer `200`.
#[derive(Default)]
pub struct MockChatApi {
    histories: Mutex<HashMap<ConversationId, Scripted>>,
    gates: Mutex<HashMap<ConversationId, oneshot::Receiver<()>>>,
    clear: Mutex<Option<Scripted>>,
    delete: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, conversation_id: &str, response: Scripted) {
        self.histories
            .lock()
            .insert(ConversationId::new(conversation_id), response);
    }

    /// Answer the history request with a list of `(id, text, from)` entries
    pub fn set_history_messages(&self, conversation_id: &str, entries: &[(&str, &str, &str)]) {
        self.set_history(
            conversation_id,
            Ok(ok_json(history_json(conversation_id, entries))),
        );
    }

    /// Keep the next history request for `conversation_id` pending until the
    /// returned sender fires (or is dropped)
    pub fn hold_history(&self, conversation_id: &str) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates
            .lock()
            .insert(ConversationId::new(conversation_id), gate);
        release
    }

    pub fn set_clear_response(&self, response: Scripted) {
        *self.clear.lock() = Some(response);
    }

    pub fn set_delete_response(&self, response: Scripted) {
        *self.delete.lock() = Some(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_of(&self, kind: RequestKind) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.kind == kind)
            .cloned()
            .collect()
    }

    pub fn history_requests_for(&self, conversation_id: &str) -> usize {
        self.requests_of(RequestKind::History)
            .iter()
            .filter(|request| request.conversation_id.as_str() == conversation_id)
            .count()
    }

    /// Wait until a history request for `conversation_id` has been issued
    pub async fn wait_for_history_request(&self, conversation_id: &str) {
        wait_until(|| self.history_requests_for(conversation_id) > 0).await;
    }

    fn record(&self, kind: RequestKind, ctx: &RequestContext, conversation_id: &ConversationId) {
        self.requests.lock().push(RecordedRequest {
            kind,
            conversation_id: conversation_id.clone(),
            base_url: ctx.base_url.to_string(),
            bearer: ctx.bearer.clone(),
        });
    }
}

#[async_trait]
impl RemoteChatApi for MockChatApi {
    async fn fetch_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.record(RequestKind::History, ctx, conversation_id);

        let gate = self.gates.lock().remove(conversation_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.histories
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| Ok(ok_json("[]")))
    }

    async fn clear_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.record(RequestKind::Clear, ctx, conversation_id);
        self.clear
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(RemoteResponse::new(200, "OK", "")))
    }

    async fn delete_conversation(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.record(RequestKind::Delete, ctx, conversation_id);
        self.delete
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(RemoteResponse::new(200, "OK", "")))
    }
}

pub fn ok_json(body: impl Into<String>) -> RemoteResponse {
    RemoteResponse::new(200, "OK", body)
}

pub fn not_found() -> RemoteResponse {
    RemoteResponse::new(404, "Not Found", "Cannot DELETE")
}

pub fn history_json(conversation_id: &str, entries: &[(&str, &str, &str)]) -> String {
    let items: Vec<Value> = entries
        .iter()
        .map(|(id, text, from)| message_payload(id, conversation_id, text, from))
        .collect();
    Value::Array(items).to_string()
}

pub fn message_payload(id: &str, conversation_id: &str, text: &str, from: &str) -> Value {
    json!({
        "id": id,
        "chatId": conversation_id,
        "text": text,
        "from": from,
        "createdAt": "2024-05-01T10:00:00Z",
    })
}

pub fn create_test_message(id: &str, conversation_id: &str, text: &str) -> Message {
    Message::new(MessageId::new(id), conversation_id, Sender::Visitor, text)
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.as_str().to_string()).collect()
}

/// Poll `condition` until it holds; panics after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Everything currently queued on an event receiver
pub fn drain_events(events: &mut UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut drained = Vec::new();
    while let Some(Some(event)) = events.next().now_or_never() {
        drained.push(event);
    }
    drained
}

/// Handlers bound on `event` by conversation subscriptions
///
/// Excludes the session's own summary handler, which stays bound for the
/// session's lifetime.
pub fn subscription_handlers(transport: &MemoryTransport, event: &str) -> usize {
    transport.handler_count(event).saturating_sub(1)
}

pub struct TestSession {
    pub api: Arc<MockChatApi>,
    pub transport: Arc<MemoryTransport>,
    pub credentials: Arc<StaticCredentials>,
    pub session: Arc<ChatSession>,
    pub events: UnboundedReceiver<ChatEvent>,
}

pub fn create_test_session() -> TestSession {
    let api = Arc::new(MockChatApi::new());
    let transport = Arc::new(MemoryTransport::new());
    let credentials = Arc::new(StaticCredentials::new(Some("test-token".to_string())));
    let endpoint = EndpointSelector::new("http://localhost:3000").unwrap();

    let (session, events) = ChatSession::new(
        api.clone(),
        transport.clone(),
        endpoint,
        credentials.clone(),
        "site-1",
    );

    TestSession {
        api,
        transport,
        credentials,
        session: Arc::new(session),
        events,
    }
}
