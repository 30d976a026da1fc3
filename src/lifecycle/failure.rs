//! Failure translation.
//!
//! Maps the cause of a failed decode or dispatch to what goes on the wire
//! before the link closes. Every cause closes the link; only CONNECT
//! negotiation and security failures get a CONNACK first.
//!
//! | Cause | Reply | Log |
//! |-------|-------|-----|
//! | [`Cause::IdentifierRejected`] | CONNACK 0x02 | debug |
//! | [`Cause::UnacceptableProtocolVersion`] | CONNACK 0x01 | debug |
//! | [`Cause::Authentication`] | CONNACK 0x04 | warn |
//! | [`Cause::Authorization`] | CONNACK 0x05 | warn |
//! | [`Cause::Transport`] | none | error, with client ID |
//! | [`Cause::Other`] | none | error, full detail |
//!
//! Security refusals carry nothing beyond the mandated return code; the
//! diagnostic detail stays in the log.

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;
use std::io::{Error as IoError, ErrorKind};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::identifiers::ClientId;
use crate::protocol::{ConnAck, ConnectReturnCode};

// ============================================================================
// Cause
// ============================================================================

/// Why a link is being failed.
#[derive(Error, Debug)]
pub enum Cause {
    /// The client identifier is not acceptable.
    #[error("identifier rejected: {reason}")]
    IdentifierRejected {
        /// Diagnostic detail.
        reason: String,
    },

    /// The protocol level is not supported.
    #[error("unacceptable protocol version {level}")]
    UnacceptableProtocolVersion {
        /// Protocol level byte from CONNECT.
        level: u8,
    },

    /// Credentials were rejected.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Diagnostic detail.
        reason: String,
    },

    /// The client may not connect.
    #[error("authorization failed: {reason}")]
    Authorization {
        /// Diagnostic detail.
        reason: String,
    },

    /// The link itself failed.
    #[error("transport failure: {0}")]
    Transport(#[source] IoError),

    /// Anything else.
    #[error("unclassified failure: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl Cause {
    /// Wraps an arbitrary error as [`Cause::Other`].
    #[inline]
    pub fn other(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

impl From<IoError> for Cause {
    fn from(err: IoError) -> Self {
        Self::Transport(err)
    }
}

impl From<Error> for Cause {
    fn from(err: Error) -> Self {
        match err {
            Error::IdentifierRejected { client_id } => Self::IdentifierRejected {
                reason: format!("client id {client_id:?}"),
            },
            Error::UnacceptableProtocolVersion { level } => {
                Self::UnacceptableProtocolVersion { level }
            }
            Error::Authentication { message } => Self::Authentication { reason: message },
            Error::Authorization { message } => Self::Authorization { reason: message },
            Error::Io(e) => Self::Transport(e),
            Error::ConnectionClosed => {
                Self::Transport(IoError::new(ErrorKind::BrokenPipe, "connection closed"))
            }
            other => Self::Other(Box::new(other)),
        }
    }
}

// ============================================================================
// FailureAction
// ============================================================================

/// What to do with a failed link. The link is always closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureAction {
    /// Packet to write before closing.
    pub reply: Option<ConnAck>,
}

impl FailureAction {
    /// Refuse with a CONNACK, then close.
    const fn refuse(code: ConnectReturnCode) -> Self {
        Self {
            reply: Some(ConnAck::refused(code)),
        }
    }

    /// Close without writing.
    const fn close() -> Self {
        Self { reply: None }
    }
}

// ============================================================================
// Translation
// ============================================================================

/// Translates a failure cause into the action taken on the link.
///
/// Total over [`Cause`]; logs one diagnostic per call.
pub fn translate(cause: &Cause, client_id: Option<&ClientId>) -> FailureAction {
    let client = client_id.map_or("<unknown>", ClientId::as_str);

    match cause {
        Cause::IdentifierRejected { reason } => {
            debug!(client_id = client, reason = %reason, "Refusing connect: identifier rejected");
            FailureAction::refuse(ConnectReturnCode::IdentifierRejected)
        }
        Cause::UnacceptableProtocolVersion { level } => {
            debug!(client_id = client, level, "Refusing connect: unsupported protocol level");
            FailureAction::refuse(ConnectReturnCode::UnacceptableProtocolVersion)
        }
        Cause::Authentication { reason } => {
            warn!(client_id = client, reason = %reason, "Refusing connect: authentication failed");
            FailureAction::refuse(ConnectReturnCode::BadUsernameOrPassword)
        }
        Cause::Authorization { reason } => {
            warn!(client_id = client, reason = %reason, "Refusing connect: not authorized");
            FailureAction::refuse(ConnectReturnCode::NotAuthorized)
        }
        Cause::Transport(e) => {
            error!(client_id = client, error = %e, "Connection failed");
            FailureAction::close()
        }
        Cause::Other(e) => {
            error!(client_id = client, error = %e, detail = ?e, "Unhandled failure, closing connection");
            FailureAction::close()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_code(cause: Cause) -> Option<ConnectReturnCode> {
        translate(&cause, None).reply.map(|connack| connack.return_code)
    }

    #[test]
    fn test_negotiation_failures_refuse() {
        assert_eq!(
            reply_code(Cause::IdentifierRejected {
                reason: "too long".into()
            }),
            Some(ConnectReturnCode::IdentifierRejected)
        );
        assert_eq!(
            reply_code(Cause::UnacceptableProtocolVersion { level: 7 }),
            Some(ConnectReturnCode::UnacceptableProtocolVersion)
        );
    }

    #[test]
    fn test_security_failures_refuse() {
        assert_eq!(
            reply_code(Cause::Authentication {
                reason: "bad password".into()
            }),
            Some(ConnectReturnCode::BadUsernameOrPassword)
        );
        assert_eq!(
            reply_code(Cause::Authorization {
                reason: "acl".into()
            }),
            Some(ConnectReturnCode::NotAuthorized)
        );
    }

    #[test]
    fn test_refusals_never_claim_session() {
        let action = translate(
            &Cause::Authentication {
                reason: String::new(),
            },
            Some(&ClientId::from("c1")),
        );
        assert!(action.reply.is_some_and(|connack| !connack.session_present));
    }

    #[test]
    fn test_transport_and_other_close_silently() {
        let reset = IoError::new(ErrorKind::ConnectionReset, "reset");
        assert_eq!(reply_code(Cause::from(reset)), None);
        assert_eq!(reply_code(Cause::other("mystery")), None);
    }

    #[test]
    fn test_from_error_classification() {
        assert!(matches!(
            Cause::from(Error::authentication("x")),
            Cause::Authentication { .. }
        ));
        assert!(matches!(
            Cause::from(Error::authorization("x")),
            Cause::Authorization { .. }
        ));
        assert!(matches!(
            Cause::from(Error::identifier_rejected("bad id")),
            Cause::IdentifierRejected { .. }
        ));
        assert!(matches!(
            Cause::from(Error::unacceptable_protocol_version(3)),
            Cause::UnacceptableProtocolVersion { level: 3 }
        ));
        assert!(matches!(
            Cause::from(Error::ConnectionClosed),
            Cause::Transport(_)
        ));
        assert!(matches!(
            Cause::from(Error::from(IoError::from(ErrorKind::BrokenPipe))),
            Cause::Transport(_)
        ));
        assert!(matches!(
            Cause::from(Error::dispatch("boom")),
            Cause::Other(_)
        ));
    }

    #[test]
    fn test_other_keeps_source_detail() {
        let cause = Cause::from(Error::session_store("disk full"));
        assert!(cause.to_string().contains("disk full"));
    }
}
