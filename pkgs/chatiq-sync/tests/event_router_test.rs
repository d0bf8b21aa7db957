//! Tests for LiveEventRouter
//!
//! Covers alias binding, scoped deactivation, cross-conversation routing,
//! summary bindings and malformed payload handling.

mod common;

use chatiq_sync::chatiq_store::{ConversationId, Message};
use chatiq_sync::{
    Dispatch, EventAlias, LiveEventRouter, MemoryTransport, ADMIN_MESSAGE_EVENT,
    CHAT_MESSAGE_EVENT, NEW_MESSAGE_EVENT,
};
use common::{ids, message_payload};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn collecting_dispatch() -> (Dispatch, Arc<Mutex<Vec<Message>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let dispatch: Dispatch = Arc::new(move |message: Message| sink.lock().push(message));
    (dispatch, received)
}

#[test]
fn test_activate_binds_every_alias() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (dispatch, _) = collecting_dispatch();

    assert!(router.activate(&ConversationId::new("chat-1"), dispatch));

    for alias in EventAlias::ALL {
        assert_eq!(transport.handler_count(alias.event_name()), 1);
    }
    assert!(router.is_active(&ConversationId::new("chat-1")));
}

#[test]
fn test_activate_twice_is_noop() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let chat = ConversationId::new("chat-1");
    let (dispatch, _) = collecting_dispatch();

    assert!(router.activate(&chat, Arc::clone(&dispatch)));
    assert!(!router.activate(&chat, dispatch));

    assert_eq!(transport.handler_count(CHAT_MESSAGE_EVENT), 1);
}

#[test]
fn test_each_alias_dispatches_once() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (dispatch, received) = collecting_dispatch();
    router.activate(&ConversationId::new("chat-1"), dispatch);

    transport.deliver(CHAT_MESSAGE_EVENT, message_payload("1", "chat-1", "a", "visitor"));
    transport.deliver(ADMIN_MESSAGE_EVENT, message_payload("2", "chat-1", "b", "admin"));
    transport.deliver(NEW_MESSAGE_EVENT, message_payload("3", "chat-1", "c", "visitor"));

    assert_eq!(ids(&received.lock()), vec!["1", "2", "3"]);
}

#[test]
fn test_deactivate_is_idempotent() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let chat = ConversationId::new("chat-1");
    let (dispatch, received) = collecting_dispatch();
    router.activate(&chat, dispatch);

    assert!(router.deactivate(&chat));
    assert!(!router.deactivate(&chat));
    assert!(!router.deactivate(&ConversationId::new("never-bound")));

    transport.deliver(CHAT_MESSAGE_EVENT, message_payload("1", "chat-1", "a", "visitor"));
    assert!(received.lock().is_empty());
    assert_eq!(transport.handler_count(CHAT_MESSAGE_EVENT), 0);
}

#[test]
fn test_deactivate_leaves_other_subscriptions_bound() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let chat_a = ConversationId::new("chat-a");
    let chat_b = ConversationId::new("chat-b");
    let (dispatch_a, received_a) = collecting_dispatch();
    let (dispatch_b, received_b) = collecting_dispatch();
    router.activate(&chat_a, dispatch_a);
    router.activate(&chat_b, dispatch_b);

    router.deactivate(&chat_a);

    transport.deliver(CHAT_MESSAGE_EVENT, message_payload("1", "chat-b", "b", "visitor"));
    assert!(received_a.lock().is_empty());
    assert_eq!(ids(&received_b.lock()), vec!["1"]);
    assert_eq!(router.active_subscriptions(), vec![chat_b]);
}

#[test]
fn test_foreign_conversation_goes_to_summaries() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (sink, summarized) = collecting_dispatch();
    assert!(router.bind_summaries(sink));
    let (dispatch, received) = collecting_dispatch();
    router.activate(&ConversationId::new("chat-1"), dispatch);

    transport.deliver(CHAT_MESSAGE_EVENT, message_payload("7", "chat-2", "elsewhere", "visitor"));
    transport.deliver(CHAT_MESSAGE_EVENT, message_payload("8", "chat-1", "here", "visitor"));

    assert_eq!(ids(&received.lock()), vec!["8"]);
    assert_eq!(ids(&summarized.lock()), vec!["7"]);
}

#[test]
fn test_summaries_run_without_open_conversation() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (sink, summarized) = collecting_dispatch();
    router.bind_summaries(sink);

    transport.deliver(NEW_MESSAGE_EVENT, message_payload("1", "chat-x", "hi", "visitor"));

    assert_eq!(ids(&summarized.lock()), vec!["1"]);
}

#[test]
fn test_summaries_survive_invalidate_all() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (sink, _) = collecting_dispatch();
    let (other_sink, _) = collecting_dispatch();
    assert!(router.bind_summaries(sink));
    assert!(!router.bind_summaries(other_sink));
    let (dispatch, _) = collecting_dispatch();
    router.activate(&ConversationId::new("chat-1"), dispatch);

    router.invalidate_all();
    assert_eq!(transport.handler_count(CHAT_MESSAGE_EVENT), 1);

    assert!(router.unbind_summaries());
    assert!(!router.unbind_summaries());
    for alias in EventAlias::ALL {
        assert_eq!(transport.handler_count(alias.event_name()), 0);
    }
}

#[test]
fn test_malformed_payload_is_dropped() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (dispatch, received) = collecting_dispatch();
    router.activate(&ConversationId::new("chat-1"), dispatch);

    transport.deliver(CHAT_MESSAGE_EVENT, json!({"typing": true}));
    transport.deliver(CHAT_MESSAGE_EVENT, json!(42));

    assert!(received.lock().is_empty());
}

#[test]
fn test_invalidate_all_unbinds_everything() {
    let transport = Arc::new(MemoryTransport::new());
    let router = LiveEventRouter::new(transport.clone());
    let (dispatch_a, _) = collecting_dispatch();
    let (dispatch_b, _) = collecting_dispatch();
    router.activate(&ConversationId::new("chat-a"), dispatch_a);
    router.activate(&ConversationId::new("chat-b"), dispatch_b);

    let mut dropped = router.invalidate_all();
    dropped.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    assert_eq!(
        dropped,
        vec![ConversationId::new("chat-a"), ConversationId::new("chat-b")]
    );
    assert!(router.active_subscriptions().is_empty());
    for alias in EventAlias::ALL {
        assert_eq!(transport.handler_count(alias.event_name()), 0);
    }
}
