//! WebSocket push transport
//!
//! Frames are JSON text messages of the form `{"event": "<name>", "data": {...}}`
//! in both directions. A background task owns the socket: it dispatches
//! inbound frames to the handler registry, writes queued outbound frames and
//! reconnects with a fixed delay whenever the connection drops. Connection
//! state is published on a `watch` channel together with a count of
//! established connections, so the session can re-establish subscriptions
//! after a reconnect even if it missed the disconnect in between.

use super::{
    ConnectionState, EventHandler, HandlerId, HandlerRegistry, PushTransport, TransportStatus,
};
use crate::error::TransportError;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// How a connected session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Remote closed or the socket failed; reconnect
    Dropped,
    /// Local shutdown; stop for good
    Stopped,
}

/// Push transport over a WebSocket connection
pub struct SocketTransport {
    registry: Arc<HandlerRegistry>,
    outgoing: mpsc::UnboundedSender<String>,
    status_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
}

impl SocketTransport {
    /// Start connecting in the background
    ///
    /// Must be called from within a tokio runtime. Returns immediately; use
    /// [`subscribe_status`](Self::subscribe_status) to learn when the
    /// connection is up.
    pub fn connect(url: &str, reconnect_delay: Duration) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(TransportError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        let registry = Arc::new(HandlerRegistry::default());
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) =
            watch::channel(ConnectionState::new(TransportStatus::Connecting, 0));
        let shutdown = CancellationToken::new();

        tokio::spawn(run_connection(
            url,
            reconnect_delay,
            Arc::clone(&registry),
            outgoing_rx,
            status_tx,
            shutdown.clone(),
        ));

        Ok(Self {
            registry,
            outgoing,
            status_rx,
            shutdown,
        })
    }

    /// Receiver for the latest connection state
    ///
    /// Intermediate states may be skipped by a slow reader; compare
    /// `connections` to detect a reconnect.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionState> {
        self.status_rx.clone()
    }

    /// Close the socket and stop reconnecting
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl PushTransport for SocketTransport {
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        self.registry.register(event, handler)
    }

    fn off(&self, event: &str, id: HandlerId) -> bool {
        self.registry.unregister(event, id)
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.status_rx.borrow().status != TransportStatus::Connected {
            return Err(TransportError::NotConnected);
        }

        let frame = serde_json::to_string(&Frame {
            event: event.to_string(),
            data: payload,
        })?;
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn status(&self) -> TransportStatus {
        self.status_rx.borrow().status
    }
}

async fn run_connection(
    url: Url,
    reconnect_delay: Duration,
    registry: Arc<HandlerRegistry>,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    status_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
) {
    let mut connections = 0u64;
    let publish = |status, connections| {
        let _ = status_tx.send(ConnectionState::new(status, connections));
    };

    loop {
        publish(TransportStatus::Connecting, connections);

        let connected = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((stream, _response)) => {
                connections += 1;
                info!("Push channel connected to {} (connection {})", url, connections);
                publish(TransportStatus::Connected, connections);
                if run_session(stream, &registry, &mut outgoing_rx, &shutdown).await
                    == SessionEnd::Stopped
                {
                    break;
                }
                warn!("Push channel to {} dropped", url);
            }
            Err(e) => warn!("Failed to connect push channel {}: {}", url, e),
        }

        publish(TransportStatus::Disconnected, connections);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    publish(TransportStatus::Disconnected, connections);
    debug!("Push channel task for {} stopped", url);
}

async fn run_session(
    stream: WsStream,
    registry: &HandlerRegistry,
    outgoing_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let (mut writer, mut reader) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = writer.send(WsMessage::Close(None)).await;
                return SessionEnd::Stopped;
            }
            frame = outgoing_rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = writer.send(WsMessage::Text(text.into())).await {
                        warn!("Failed to write push frame: {}", e);
                        return SessionEnd::Dropped;
                    }
                }
                None => return SessionEnd::Stopped,
            },
            incoming = reader.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => handle_frame(registry, text.as_str()),
                Some(Ok(WsMessage::Ping(payload))) => {
                    debug!("Received ping ({} bytes)", payload.len());
                }
                Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Push channel read error: {}", e);
                    return SessionEnd::Dropped;
                }
            },
        }
    }
}

fn handle_frame(registry: &HandlerRegistry, text: &str) {
    match serde_json::from_str::<Frame>(text) {
        Ok(frame) => {
            let handled = registry.dispatch(&frame.event, &frame.data);
            if handled == 0 {
                debug!("No handler bound for push event {}", frame.event);
            }
        }
        Err(e) => warn!("Ignoring malformed push frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_http_url() {
        let result = SocketTransport::connect("http://localhost:3000", Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_handle_frame_dispatches_by_event_name() {
        let registry = HandlerRegistry::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.register(
            "chat:message",
            Arc::new(move |payload: &Value| sink.lock().push(payload.clone())),
        );

        handle_frame(&registry, r#"{"event":"chat:message","data":{"id":"1"}}"#);
        handle_frame(&registry, r#"{"event":"other","data":{}}"#);
        handle_frame(&registry, "not json");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["id"], "1");
    }
}
