//! Error types for synchronization and remote commands
//!
//! Remote failures are converted into these types at the History Loader and
//! Command Gateway boundary. None of them is fatal; the caller decides how to
//! notify the user, using [`CommandError::user_message`] where a ready-made
//! text is wanted.

use std::fmt;
use thiserror::Error;

/// History retrieval failed or returned an unexpected shape
///
/// The activation controller treats every variant as an empty backlog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("History endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("History request failed with status {status}")]
    Status { status: u16 },
    #[error("History payload malformed: {0}")]
    Malformed(String),
}

/// Remote command kinds, used to word error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Send,
    ClearHistory,
    DeleteConversation,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Send => "send message",
            CommandKind::ClearHistory => "clear chat",
            CommandKind::DeleteConversation => "delete chat",
        };
        f.write_str(name)
    }
}

/// A remote command failed; local state was left untouched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The remote answered 404: the endpoint does not exist on this server
    #[error("Remote endpoint for {operation} is not implemented")]
    NotImplementedRemote { operation: CommandKind },
    /// The request never got an answer
    #[error("Network unreachable during {operation}: {reason}")]
    NetworkUnreachable {
        operation: CommandKind,
        reason: String,
    },
    /// The remote refused the command
    #[error("Remote rejected {operation}: {status} {reason}")]
    Rejected {
        operation: CommandKind,
        status: u16,
        reason: String,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CommandError {
    /// Text shown to the agent for this failure category
    pub fn user_message(&self) -> String {
        match self {
            CommandError::NotImplementedRemote { .. } => {
                "Error 404: the backend server does not have this feature yet. \
                 Deploy the latest server build, or switch to the local API target."
                    .to_string()
            }
            CommandError::NetworkUnreachable { .. } => {
                "Network error. Please check if the API server is reachable.".to_string()
            }
            CommandError::Rejected {
                operation, reason, ..
            } => format!("Failed to {}: {}", operation, reason),
            CommandError::Transport(_) => {
                "Not connected to the live chat server. The message was not sent.".to_string()
            }
        }
    }
}

/// Push channel failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Transport has been shut down")]
    Closed,
    #[error("Invalid transport URL: {0}")]
    InvalidUrl(String),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        TransportError::Serialization(error.to_string())
    }
}

/// Invalid endpoint or client configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl From<url::ParseError> for ConfigError {
    fn from(error: url::ParseError) -> Self {
        ConfigError::InvalidUrl(error.to_string())
    }
}
