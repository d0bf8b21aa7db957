//! Endpoint selection, credentials and per-request context
//!
//! The API base address can be switched between the local and hosted server
//! while the dashboard is running. Components never cache it: every request
//! resolves a fresh [`RequestContext`] from the [`EndpointSelector`] and the
//! [`CredentialProvider`].

use crate::error::ConfigError;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Hosted API server
pub const HOSTED_API_URL: &str = "https://api-server-chatiq.onrender.com";

/// API server started locally for development
pub const LOCAL_API_URL: &str = "http://localhost:3000";

/// Push channel of the hosted server
pub const HOSTED_SOCKET_URL: &str = "wss://api-server-chatiq.onrender.com/ws";

/// Bearer value sent when no access token is available
pub const PLACEHOLDER_TOKEN: &str = "dummy";

/// Site the dashboard serves when none is configured
pub const DEFAULT_SITE_ID: &str = "demo123";

/// Configuration for the sync layer
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Initial API base URL; can be switched later through the selector
    pub api_base_url: String,

    /// WebSocket URL of the push channel
    pub socket_url: String,

    /// Site id attached to outgoing agent messages
    pub site_id: String,

    /// Access token from sign-in, if any
    pub access_token: Option<String>,

    /// HTTP request timeout (default: 30s)
    pub request_timeout: Duration,

    /// Delay before reconnecting a dropped push channel (default: 3s)
    pub reconnect_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: HOSTED_API_URL.to_string(),
            socket_url: HOSTED_SOCKET_URL.to_string(),
            site_id: DEFAULT_SITE_ID.to_string(),
            access_token: None,
            request_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

/// Well-known API targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTarget {
    Local,
    Hosted,
}

impl ApiTarget {
    pub fn base_url(&self) -> &'static str {
        match self {
            ApiTarget::Local => LOCAL_API_URL,
            ApiTarget::Hosted => HOSTED_API_URL,
        }
    }
}

/// Shared, runtime-switchable API base URL
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    current: Arc<RwLock<Url>>,
}

impl EndpointSelector {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            current: Arc::new(RwLock::new(parse_base_url(base_url)?)),
        })
    }

    pub fn for_target(target: ApiTarget) -> Result<Self, ConfigError> {
        Self::new(target.base_url())
    }

    /// Switch the base URL; the next request uses it
    pub fn set(&self, base_url: &str) -> Result<(), ConfigError> {
        let url = parse_base_url(base_url)?;
        info!("API endpoint switched to {}", url);
        *self.current.write() = url;
        Ok(())
    }

    pub fn set_target(&self, target: ApiTarget) -> Result<(), ConfigError> {
        self.set(target.base_url())
    }

    /// Base URL in effect right now
    pub fn current(&self) -> Url {
        self.current.read().clone()
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(base_url)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

/// Supplies the bearer token attached to remote requests
pub trait CredentialProvider: Send + Sync {
    /// Current access token, `None` when signed out
    fn access_token(&self) -> Option<String>;
}

/// Credential provider holding a token that can be replaced after sign-in
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

/// Everything a single remote request needs, resolved at call time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub base_url: Url,
    pub bearer: String,
}

impl RequestContext {
    /// Resolve the current endpoint and token
    ///
    /// A missing token is a valid degraded mode: the placeholder is sent.
    pub fn resolve(endpoint: &EndpointSelector, credentials: &dyn CredentialProvider) -> Self {
        let bearer = credentials
            .access_token()
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_TOKEN.to_string());
        Self {
            base_url: endpoint.current(),
            bearer,
        }
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.bearer)
    }

    /// Build `{base}/seg1/seg2/...`, percent-encoding each segment
    pub fn url_for(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
