//! Push transport seam
//!
//! The push channel is a single bidirectional connection shared by every
//! conversation. Inbound events are named (`chat:message`, ...) and carry a
//! JSON payload; handlers are registered per event name and identified by a
//! [`HandlerId`] so that unregistering one handler never touches another.

pub mod memory;
pub mod socket;

use crate::error::TransportError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use memory::MemoryTransport;
pub use socket::SocketTransport;

/// Callback invoked with an inbound event payload
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Connection state of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Status snapshot of the push channel
///
/// `connections` counts connections established so far. A watcher that only
/// sees the latest snapshot can still tell that a reconnect happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: TransportStatus,
    pub connections: u64,
}

impl ConnectionState {
    pub fn new(status: TransportStatus, connections: u64) -> Self {
        Self {
            status,
            connections,
        }
    }
}

/// Bidirectional push channel
pub trait PushTransport: Send + Sync {
    /// Register a handler for an event name
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId;

    /// Unregister one handler; returns whether it was registered
    fn off(&self, event: &str, id: HandlerId) -> bool;

    /// Queue an outbound event; does not wait for any acknowledgment
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    fn status(&self) -> TransportStatus;
}

/// Event name to handler bindings, shared by the transport implementations
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
}

impl HandlerRegistry {
    pub(crate) fn register(&self, event: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    pub(crate) fn unregister(&self, event: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(bound) = handlers.get_mut(event) else {
            return false;
        };
        let before = bound.len();
        bound.retain(|(bound_id, _)| *bound_id != id);
        let removed = bound.len() != before;
        if bound.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Call every handler bound to `event`; returns how many ran
    ///
    /// Handlers are cloned out first so they run without the registry lock
    /// and may register or unregister handlers themselves.
    pub(crate) fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let bound: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(event)
            .map(|bound| bound.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        for handler in &bound {
            handler(payload);
        }
        bound.len()
    }

    pub(crate) fn handler_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }
}
