//! Error types for webpilot
//!
//! `PilotError` is the crate-wide error. `ProviderError` classifies model
//! backend failures so the adapter can decide between retry, failover and
//! giving up.

use std::time::Duration;

use thiserror::Error;

/// Main error type for webpilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    /// Model provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// The page or browser session is gone
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for webpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

impl PilotError {
    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised while talking to a model backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the provider.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Suggested retry delay in milliseconds, if the provider sent one.
        retry_after_ms: Option<u64>,
        message: String,
    },

    /// Provider returned a non-success status not covered elsewhere.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Credentials missing, expired or rejected.
    #[error("Auth error: {0}")]
    Auth(String),

    /// The provider rejected the request shape.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No usable provider configuration.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let message = body.into();
        match status {
            429 => Self::RateLimited {
                retry_after_ms,
                message,
            },
            401 | 403 => Self::Auth(message),
            400 | 404 | 409 | 413 | 422 => Self::InvalidRequest(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether a retry against the same provider may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
            }
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status == 408 || *status >= 500,
            Self::Auth(_) | Self::InvalidRequest(_) | Self::Decode(_) | Self::NotConfigured(_) => {
                false
            }
        }
    }

    /// Provider-suggested delay before the next attempt.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Short category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Auth(_) => "auth",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Decode(_) => "decode",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}
