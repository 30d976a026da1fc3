//! CONNACK and outbound packet types.
//!
//! Return codes follow the MQTT 3.1.1 CONNACK table (section 3.2.2.3).
//! Clients match on the numeric value, so the discriminants are part of
//! the wire contract.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0x00 | Connection accepted |
//! | 0x01 | Unacceptable protocol version |
//! | 0x02 | Identifier rejected |
//! | 0x03 | Server unavailable |
//! | 0x04 | Bad user name or password |
//! | 0x05 | Not authorized |

// ============================================================================
// Imports
// ============================================================================

use super::{ControlPacket, Publish};

// ============================================================================
// ConnectReturnCode
// ============================================================================

/// CONNACK return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted = 0x00,
    /// The server does not support the requested protocol level.
    UnacceptableProtocolVersion = 0x01,
    /// The client identifier is well-formed UTF-8 but not allowed.
    IdentifierRejected = 0x02,
    /// The MQTT service is unavailable.
    ServerUnavailable = 0x03,
    /// Malformed user name or password.
    BadUsernameOrPassword = 0x04,
    /// The client is not authorized to connect.
    NotAuthorized = 0x05,
}

impl ConnectReturnCode {
    /// Parses a return code from its wire value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Accepted,
            0x01 => Self::UnacceptableProtocolVersion,
            0x02 => Self::IdentifierRejected,
            0x03 => Self::ServerUnavailable,
            0x04 => Self::BadUsernameOrPassword,
            0x05 => Self::NotAuthorized,
            _ => return None,
        })
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for every code except [`Self::Accepted`].
    #[inline]
    #[must_use]
    pub const fn is_refusal(self) -> bool {
        !matches!(self, Self::Accepted)
    }
}

// ============================================================================
// ConnAck
// ============================================================================

/// CONNACK packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    /// Session present flag.
    pub session_present: bool,
    /// Return code.
    pub return_code: ConnectReturnCode,
}

impl ConnAck {
    /// Fixed header byte for CONNACK (type 2, no flags).
    const HEADER: u8 = 0x20;

    /// Remaining length of a CONNACK.
    const REMAINING_LENGTH: u8 = 0x02;

    /// Creates an accepting CONNACK.
    #[inline]
    #[must_use]
    pub const fn accepted(session_present: bool) -> Self {
        Self {
            session_present,
            return_code: ConnectReturnCode::Accepted,
        }
    }

    /// Creates a refusing CONNACK.
    ///
    /// A refusal never reports a present session ([MQTT-3.2.2-4]).
    #[inline]
    #[must_use]
    pub const fn refused(return_code: ConnectReturnCode) -> Self {
        Self {
            session_present: false,
            return_code,
        }
    }

    /// Encodes the packet into its four wire bytes.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 4] {
        [
            Self::HEADER,
            Self::REMAINING_LENGTH,
            self.session_present as u8,
            self.return_code.as_u8(),
        ]
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// A packet queued for writing on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// CONNACK.
    ConnAck(ConnAck),
    /// PUBLISH towards the client.
    Publish(Publish),
    /// Any other control packet, pre-encoded by the caller.
    Control(ControlPacket),
}

impl From<ConnAck> for Outbound {
    fn from(connack: ConnAck) -> Self {
        Self::ConnAck(connack)
    }
}

impl From<Publish> for Outbound {
    fn from(publish: Publish) -> Self {
        Self::Publish(publish)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_codes_match_mqtt_311() {
        assert_eq!(ConnectReturnCode::Accepted.as_u8(), 0x00);
        assert_eq!(ConnectReturnCode::UnacceptableProtocolVersion.as_u8(), 0x01);
        assert_eq!(ConnectReturnCode::IdentifierRejected.as_u8(), 0x02);
        assert_eq!(ConnectReturnCode::ServerUnavailable.as_u8(), 0x03);
        assert_eq!(ConnectReturnCode::BadUsernameOrPassword.as_u8(), 0x04);
        assert_eq!(ConnectReturnCode::NotAuthorized.as_u8(), 0x05);
    }

    #[test]
    fn test_return_code_from_u8() {
        assert_eq!(
            ConnectReturnCode::from_u8(0x04),
            Some(ConnectReturnCode::BadUsernameOrPassword)
        );
        assert_eq!(ConnectReturnCode::from_u8(0x06), None);
    }

    #[test]
    fn test_refused_never_reports_session() {
        let connack = ConnAck::refused(ConnectReturnCode::NotAuthorized);
        assert!(!connack.session_present);
        assert!(connack.return_code.is_refusal());
    }

    #[test]
    fn test_to_bytes() {
        let refused = ConnAck::refused(ConnectReturnCode::IdentifierRejected);
        assert_eq!(refused.to_bytes(), [0x20, 0x02, 0x00, 0x02]);

        let accepted = ConnAck::accepted(true);
        assert_eq!(accepted.to_bytes(), [0x20, 0x02, 0x01, 0x00]);
    }
}
