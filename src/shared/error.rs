//! Shared Error Types
//!
//! This module defines the failure taxonomy shared by every component of the
//! sync engine. The same categories drive very different handling downstream:
//! authentication failures surface immediately, network failures degrade to a
//! queued offline write, server rejections become the operation's error state,
//! and malformed push frames are dropped without touching the connection.
//!
//! # Error Categories
//!
//! - `Auth` - missing token or a request the server refused to authenticate
//! - `Network` - no response received (transport failure, timeout)
//! - `Server` - a response was received with a non-success status
//! - `Decode` - a payload that could not be decoded
//!
//! # Usage
//!
//! ```rust
//! use shelfsync::shared::error::SyncError;
//!
//! let error = SyncError::network("connection refused");
//! assert!(error.is_recoverable());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread
//! boundaries.
use thiserror::Error;

/// Failure taxonomy for remote calls, queue replay and push decoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Missing/empty token, or the server returned unauthorized
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable error message
        message: String,
    },

    /// No response was received: transport failure or timeout
    #[error("network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// The server answered with a non-success status
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code of the response
        status: u16,
        /// Human-readable error message
        message: String,
    },

    /// A body or frame that could not be decoded
    #[error("decode error: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether retrying later can succeed.
    ///
    /// Only network failures qualify: auth and server rejections are not
    /// expected to change merely by waiting, and decode failures never will.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(format!("response body: {}", err))
        } else {
            // Everything else on this path means no usable response arrived.
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::network(format!("websocket: {}", err))
    }
}
