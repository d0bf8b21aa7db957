//! Tests for HistoryLoader
//!
//! Covers backlog parsing, failure classification and per-request endpoint
//! and credential resolution.

mod common;

use chatiq_sync::chatiq_store::{ConversationId, Sender};
use chatiq_sync::{
    parse_backlog, ApiTarget, EndpointSelector, FetchError, HistoryLoader, RemoteError,
    RemoteResponse, StaticCredentials, PLACEHOLDER_TOKEN,
};
use common::{ids, ok_json, MockChatApi, RequestKind};
use std::sync::Arc;

fn create_loader(api: &Arc<MockChatApi>, credentials: &Arc<StaticCredentials>) -> (HistoryLoader, EndpointSelector) {
    let endpoint = EndpointSelector::for_target(ApiTarget::Local).unwrap();
    let loader = HistoryLoader::new(api.clone(), endpoint.clone(), credentials.clone());
    (loader, endpoint)
}

#[tokio::test]
async fn test_load_returns_backlog_in_order() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::new(Some("token".to_string())));
    let (loader, _) = create_loader(&api, &credentials);
    api.set_history_messages(
        "chat-1",
        &[("1", "hi", "visitor"), ("2", "hello", "admin"), ("3", "bye", "visitor")],
    );

    let backlog = loader.load(&ConversationId::new("chat-1")).await.unwrap();

    assert_eq!(ids(&backlog), vec!["1", "2", "3"]);
    assert_eq!(backlog[1].sender, Sender::Agent);
    assert_eq!(api.history_requests_for("chat-1"), 1);
}

#[tokio::test]
async fn test_load_empty_list() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::default());
    let (loader, _) = create_loader(&api, &credentials);

    let backlog = loader.load(&ConversationId::new("chat-1")).await.unwrap();
    assert!(backlog.is_empty());
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::default());
    let (loader, _) = create_loader(&api, &credentials);
    api.set_history(
        "chat-1",
        Ok(RemoteResponse::new(500, "Internal Server Error", "boom")),
    );

    let result = loader.load(&ConversationId::new("chat-1")).await;
    assert_eq!(result, Err(FetchError::Status { status: 500 }));
}

#[tokio::test]
async fn test_unreachable_remote_is_fetch_error() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::default());
    let (loader, _) = create_loader(&api, &credentials);
    api.set_history(
        "chat-1",
        Err(RemoteError::Unreachable("connection refused".to_string())),
    );

    let result = loader.load(&ConversationId::new("chat-1")).await;
    assert!(matches!(result, Err(FetchError::Unreachable(reason)) if reason.contains("connection refused")));
}

#[tokio::test]
async fn test_non_list_payload_is_malformed() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::default());
    let (loader, _) = create_loader(&api, &credentials);
    api.set_history("chat-1", Ok(ok_json(r#"{"error":"not found"}"#)));

    let result = loader.load(&ConversationId::new("chat-1")).await;
    assert!(matches!(result, Err(FetchError::Malformed(_))));
}

#[tokio::test]
async fn test_missing_token_sends_placeholder() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::new(None));
    let (loader, _) = create_loader(&api, &credentials);

    loader.load(&ConversationId::new("chat-1")).await.unwrap();
    credentials.set_token(Some("real-token".to_string()));
    loader.load(&ConversationId::new("chat-1")).await.unwrap();

    let requests = api.requests_of(RequestKind::History);
    assert_eq!(requests[0].bearer, PLACEHOLDER_TOKEN);
    assert_eq!(requests[1].bearer, "real-token");
}

#[tokio::test]
async fn test_endpoint_switch_applies_to_next_request() {
    let api = Arc::new(MockChatApi::new());
    let credentials = Arc::new(StaticCredentials::default());
    let (loader, endpoint) = create_loader(&api, &credentials);

    loader.load(&ConversationId::new("chat-1")).await.unwrap();
    endpoint.set_target(ApiTarget::Hosted).unwrap();
    loader.load(&ConversationId::new("chat-1")).await.unwrap();

    let requests = api.requests_of(RequestKind::History);
    assert!(requests[0].base_url.starts_with("http://localhost:3000"));
    assert!(requests[1]
        .base_url
        .starts_with("https://api-server-chatiq.onrender.com"));
}

#[test]
fn test_parse_backlog_skips_malformed_entries() {
    let chat = ConversationId::new("chat-1");
    let body = r#"[
        {"id": "1", "chatId": "chat-1", "text": "hi", "from": "visitor"},
        {"id": "2", "text": "no sender"},
        "not a message",
        {"id": 3, "chatId": "chat-1", "text": "numeric id", "from": "admin"}
    ]"#;

    let backlog = parse_backlog(&chat, body).unwrap();
    assert_eq!(ids(&backlog), vec!["1", "3"]);
}

#[test]
fn test_parse_backlog_fills_missing_conversation_id() {
    let chat = ConversationId::new("chat-9");
    let body = r#"[{"id": "1", "text": "hi", "from": "visitor"}]"#;

    let backlog = parse_backlog(&chat, body).unwrap();
    assert_eq!(backlog[0].conversation_id, chat);
}

#[test]
fn test_parse_backlog_rejects_invalid_json() {
    let chat = ConversationId::new("chat-1");
    assert!(matches!(
        parse_backlog(&chat, "<html>502</html>"),
        Err(FetchError::Malformed(_))
    ));
    assert!(matches!(
        parse_backlog(&chat, "null"),
        Err(FetchError::Malformed(_))
    ));
}
