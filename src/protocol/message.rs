//! Decoded MQTT message model.
//!
//! The packet decoder lives outside this crate. It hands the link one
//! [`Inbound`] per decoded unit: either a well-formed [`Message`] or the
//! [`Cause`] of a decode failure.
//!
//! The lifecycle core never looks inside a [`Message`]; the types here
//! exist so that downstream dispatchers and the will-message path share
//! one vocabulary.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ClientId;
use crate::lifecycle::Cause;
use crate::session::WillMessage;

// ============================================================================
// QoS
// ============================================================================

/// Delivery guarantee of a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery.
    AtLeastOnce = 1,
    /// Assured single delivery.
    ExactlyOnce = 2,
}

impl QoS {
    /// Parses a QoS level from its wire value.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

// ============================================================================
// PacketType
// ============================================================================

/// MQTT 3.1.1 control packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Parses the upper nibble of a fixed header byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Connect,
            2 => Self::ConnAck,
            3 => Self::Publish,
            4 => Self::PubAck,
            5 => Self::PubRec,
            6 => Self::PubRel,
            7 => Self::PubComp,
            8 => Self::Subscribe,
            9 => Self::SubAck,
            10 => Self::Unsubscribe,
            11 => Self::UnsubAck,
            12 => Self::PingReq,
            13 => Self::PingResp,
            14 => Self::Disconnect,
            _ => return None,
        })
    }
}

// ============================================================================
// Message Bodies
// ============================================================================

/// Decoded CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    /// Protocol level byte (4 for MQTT 3.1.1).
    pub protocol_level: u8,
    /// Client identifier.
    pub client_id: ClientId,
    /// Clean session flag.
    pub clean_session: bool,
    /// Keep alive in seconds.
    pub keep_alive: u16,
    /// Will registered with this CONNECT.
    pub will: Option<WillMessage>,
    /// User name, if present.
    pub username: Option<String>,
    /// Password bytes, if present.
    pub password: Option<Vec<u8>>,
}

/// Decoded PUBLISH packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    /// Topic name.
    pub topic: String,
    /// Application payload.
    pub payload: Vec<u8>,
    /// Requested QoS.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// Duplicate delivery flag.
    pub dup: bool,
    /// Packet identifier (QoS 1 and 2 only).
    pub packet_id: Option<u16>,
}

impl Publish {
    /// Creates a QoS 0 publish.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
            dup: false,
            packet_id: None,
        }
    }
}

/// Any other control packet, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    /// Packet type.
    pub packet_type: PacketType,
    /// Variable header and payload as received.
    pub body: Vec<u8>,
}

impl ControlPacket {
    /// Creates a control packet with an empty body.
    #[inline]
    #[must_use]
    pub fn empty(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            body: Vec::new(),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A well-formed decoded MQTT message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// CONNECT.
    Connect(Connect),
    /// PUBLISH.
    Publish(Publish),
    /// Everything else.
    Control(ControlPacket),
}

impl Message {
    /// Returns the packet type.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::Publish(_) => PacketType::Publish,
            Self::Control(packet) => packet.packet_type,
        }
    }
}

impl From<Publish> for Message {
    fn from(publish: Publish) -> Self {
        Self::Publish(publish)
    }
}

impl From<Connect> for Message {
    fn from(connect: Connect) -> Self {
        Self::Connect(connect)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// One decoded unit as delivered by the transport.
#[derive(Debug)]
pub enum Inbound {
    /// Decoding succeeded.
    Message(Message),
    /// Decoding failed; carries why.
    Malformed(Cause),
}

impl Inbound {
    /// Returns `true` if decoding failed.
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl From<Message> for Inbound {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Cause> for Inbound {
    fn from(cause: Cause) -> Self {
        Self::Malformed(cause)
    }
}

// ============================================================================
// Tests
// ============================================================================
