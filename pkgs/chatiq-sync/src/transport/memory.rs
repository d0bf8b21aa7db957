//! In-process transport
//!
//! Delivers events synchronously to registered handlers and records every
//! outbound frame. Used by tests and by offline demos of the console.

use super::{EventHandler, HandlerId, HandlerRegistry, PushTransport, TransportStatus};
use crate::error::TransportError;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Transport that lives entirely in memory
pub struct MemoryTransport {
    registry: HandlerRegistry,
    status: Mutex<TransportStatus>,
    sent: Mutex<Vec<(String, Value)>>,
}

impl MemoryTransport {
    /// Create a transport that starts out connected
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::default(),
            status: Mutex::new(TransportStatus::Connected),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Simulate an inbound event; returns how many handlers ran
    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        debug!("Delivering {} to local handlers", event);
        self.registry.dispatch(event, &payload)
    }

    pub fn set_status(&self, status: TransportStatus) {
        *self.status.lock() = status;
    }

    /// Every frame emitted so far, oldest first
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().clone()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.registry.handler_count(event)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PushTransport for MemoryTransport {
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        self.registry.register(event, handler)
    }

    fn off(&self, event: &str, id: HandlerId) -> bool {
        self.registry.unregister(event, id)
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if *self.status.lock() != TransportStatus::Connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push((event.to_string(), payload));
        Ok(())
    }

    fn status(&self) -> TransportStatus {
        *self.status.lock()
    }
}
