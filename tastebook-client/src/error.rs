//! Client error types

use std::time::Duration;
use thiserror::Error;

/// Backend codes for races that resolve on retry
/// (serialization failure, deadlock, unique-constraint race).
pub const TRANSIENT_BACKEND_CODES: [&str; 3] = ["40001", "40P01", "23505"];

/// HTTP statuses that signal a transient server condition
pub const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Message fragments that identify a transport-level failure
const NETWORK_SIGNATURES: [&str; 11] = [
    "connection reset",
    "connection refused",
    "connection closed",
    "connection aborted",
    "failed to fetch",
    "fetch failed",
    "network error",
    "network is unreachable",
    "request aborted",
    "broken pipe",
    "econnreset",
];

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A single attempt exceeded its time budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Device reports no connectivity
    #[error("Network unavailable: device is offline")]
    Offline,

    /// Transport failure reported as text
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status without a more specific mapping
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Error code reported by the backend database
    #[error("Backend error {code}: {message}")]
    Backend { code: String, message: String },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate entity
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether retrying the same call can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Offline | Self::Network(_) => true,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| TRANSIENT_STATUSES.contains(&s.as_u16()))
                    || matches_network_signature(&e.to_string())
            }
            Self::Status { status, message } => {
                TRANSIENT_STATUSES.contains(status) || matches_network_signature(message)
            }
            Self::Backend { code, .. } => TRANSIENT_BACKEND_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// Authentication or authorization failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden(_))
    }

    /// Rejected input or business rule
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict(_) | Self::NotFound(_)
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }
}

fn matches_network_signature(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
