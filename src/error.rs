//! Error types for the MQTT lifecycle core.
//!
//! This module defines the crate-wide [`Error`] enum. Errors raised by a
//! [`MessageDispatcher`](crate::lifecycle::MessageDispatcher) are classified
//! into a [`Cause`](crate::lifecycle::Cause) before they reach the wire, so
//! the variants below double as the vocabulary downstream protocol handlers
//! use to reject a client.
//!
//! # Usage
//!
//! ```ignore
//! use mqtt_lifecycle::{Error, Result};
//!
//! fn check_password(ok: bool) -> Result<()> {
//!     if !ok {
//!         return Err(Error::authentication("bad credentials"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Negotiation | [`Error::IdentifierRejected`], [`Error::UnacceptableProtocolVersion`] |
//! | Security | [`Error::Authentication`], [`Error::Authorization`] |
//! | Session | [`Error::SessionMissing`], [`Error::SessionStore`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::Dispatch`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when broker options or the builder are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Negotiation Errors
    // ========================================================================
    /// Client identifier rejected.
    ///
    /// Raised by the connect handler for malformed or disallowed identifiers.
    #[error("Client identifier rejected: {client_id:?}")]
    IdentifierRejected {
        /// The identifier the client presented.
        client_id: String,
    },

    /// Protocol level not supported by this broker.
    #[error("Unacceptable protocol version: {level}")]
    UnacceptableProtocolVersion {
        /// Protocol level byte from CONNECT.
        level: u8,
    },

    // ========================================================================
    // Security Errors
    // ========================================================================
    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Diagnostic detail (never sent to the client).
        message: String,
    },

    /// Authorization failed.
    #[error("Not authorized: {message}")]
    Authorization {
        /// Diagnostic detail (never sent to the client).
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A connection reached teardown without the Session it carried.
    ///
    /// This is a programming defect upstream, never a client error.
    #[error("Session missing at teardown: connection={connection_id}, client={client_id:?}")]
    SessionMissing {
        /// Connection being torn down.
        connection_id: ConnectionId,
        /// Cached client identifier, if one was negotiated.
        client_id: Option<String>,
    },

    /// Session store backend failure.
    #[error("Session store error: {message}")]
    SessionStore {
        /// Description of the backend failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Link already closed or closing.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Dispatcher failure that fits no other category.
    #[error("Dispatch error: {message}")]
    Dispatch {
        /// Description of the dispatch failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an identifier rejected error.
    #[inline]
    pub fn identifier_rejected(client_id: impl Into<String>) -> Self {
        Self::IdentifierRejected {
            client_id: client_id.into(),
        }
    }

    /// Creates an unacceptable protocol version error.
    #[inline]
    pub fn unacceptable_protocol_version(level: u8) -> Self {
        Self::UnacceptableProtocolVersion { level }
    }

    /// Creates an authentication error.
    #[inline]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[inline]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a session missing error.
    #[inline]
    pub fn session_missing(connection_id: ConnectionId, client_id: Option<String>) -> Self {
        Self::SessionMissing {
            connection_id,
            client_id,
        }
    }

    /// Creates a session store error.
    #[inline]
    pub fn session_store(message: impl Into<String>) -> Self {
        Self::SessionStore {
            message: message.into(),
        }
    }

    /// Creates a dispatch error.
    #[inline]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error maps to a refusing CONNACK.
    #[inline]
    #[must_use]
    pub fn is_connect_refusal(&self) -> bool {
        matches!(
            self,
            Self::IdentifierRejected { .. }
                | Self::UnacceptableProtocolVersion { .. }
                | Self::Authentication { .. }
                | Self::Authorization { .. }
        )
    }

    /// Returns `true` if this is an authentication or authorization error.
    #[inline]
    #[must_use]
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Authorization { .. }
        )
    }

    /// Returns `true` if the underlying link is gone.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================
