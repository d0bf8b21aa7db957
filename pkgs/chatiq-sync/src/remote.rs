//! Remote chat API seam and its HTTP implementation
//!
//! The remote archive exposes three endpoints:
//!
//! - `GET    {base}/chats/{id}/history` - message backlog
//! - `DELETE {base}/chats/{id}/clear`   - clear a conversation's history
//! - `DELETE {base}/chats/{id}`         - delete a conversation
//!
//! Implementations only move bytes. Interpreting status codes and payloads is
//! the job of the History Loader and the Command Gateway.

use crate::config::RequestContext;
use crate::error::ConfigError;
use async_trait::async_trait;
use chatiq_store::ConversationId;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Raw answer of the remote API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request did not produce a response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote unreachable: {0}")]
    Unreachable(String),
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Remote history, clear and delete endpoints
#[async_trait]
pub trait RemoteChatApi: Send + Sync {
    async fn fetch_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError>;

    async fn clear_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError>;

    async fn delete_conversation(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError>;
}

/// `RemoteChatApi` over HTTP
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    http: reqwest::Client,
}

impl HttpChatApi {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn execute(
        &self,
        method: reqwest::Method,
        ctx: &RequestContext,
        segments: &[&str],
    ) -> Result<RemoteResponse, RemoteError> {
        let url = ctx
            .url_for(segments)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        debug!("{} {}", method, url);

        let response = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, ctx.authorization())
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("failed to read body: {}", e)))?;

        Ok(RemoteResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}

#[async_trait]
impl RemoteChatApi for HttpChatApi {
    async fn fetch_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.execute(
            reqwest::Method::GET,
            ctx,
            &["chats", conversation_id.as_str(), "history"],
        )
        .await
    }

    async fn clear_history(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.execute(
            reqwest::Method::DELETE,
            ctx,
            &["chats", conversation_id.as_str(), "clear"],
        )
        .await
    }

    async fn delete_conversation(
        &self,
        ctx: &RequestContext,
        conversation_id: &ConversationId,
    ) -> Result<RemoteResponse, RemoteError> {
        self.execute(
            reqwest::Method::DELETE,
            ctx,
            &["chats", conversation_id.as_str()],
        )
        .await
    }
}
