//! Per-client session state.
//!
//! A [`Session`] outlives the link it was created on when the client
//! connected with `clean_session = false`. The packet identifier counter
//! is the part that must survive: reusing an identifier that is still in
//! flight on the client side causes acknowledgments to be matched to the
//! wrong message.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ClientId;
use crate::protocol::{Publish, QoS};

// ============================================================================
// WillMessage
// ============================================================================

/// Message the broker publishes on the client's behalf if the link dies
/// without a DISCONNECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WillMessage {
    /// Topic the will is published to.
    pub topic: String,
    /// Will payload.
    pub payload: Vec<u8>,
    /// QoS the will is published with.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
}

impl WillMessage {
    /// Creates a will message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        }
    }

    /// Builds the PUBLISH that delivers this will.
    ///
    /// No packet identifier is assigned: the dispatcher routes it like any
    /// client-originated publish and allocates identifiers per subscriber.
    #[must_use]
    pub fn to_publish(&self) -> Publish {
        Publish {
            topic: self.topic.clone(),
            payload: self.payload.clone(),
            qos: self.qos,
            retain: self.retain,
            dup: false,
            packet_id: None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Continuity state for one logical client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Client this session belongs to.
    client_id: ClientId,
    /// Discard on disconnect when `true`.
    clear_session: bool,
    /// Last packet identifier handed out (0 = none yet).
    message_id: u16,
    /// Registered will, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    will_message: Option<WillMessage>,
}

impl Session {
    /// Creates a fresh session.
    #[inline]
    #[must_use]
    pub fn new(client_id: impl Into<ClientId>, clear_session: bool) -> Self {
        Self {
            client_id: client_id.into(),
            clear_session,
            message_id: 0,
            will_message: None,
        }
    }

    /// Attaches a will message.
    #[inline]
    #[must_use]
    pub fn with_will(mut self, will: WillMessage) -> Self {
        self.will_message = Some(will);
        self
    }

    /// Returns the client ID.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Returns the clean session flag.
    #[inline]
    #[must_use]
    pub fn clear_session(&self) -> bool {
        self.clear_session
    }

    /// Updates the clean session flag (a reconnect may change it).
    #[inline]
    pub fn set_clear_session(&mut self, clear_session: bool) {
        self.clear_session = clear_session;
    }

    /// Returns the registered will.
    #[inline]
    #[must_use]
    pub fn will(&self) -> Option<&WillMessage> {
        self.will_message.as_ref()
    }

    /// Replaces the registered will.
    #[inline]
    pub fn set_will(&mut self, will: Option<WillMessage>) {
        self.will_message = will;
    }

    /// Removes and returns the will.
    ///
    /// A graceful DISCONNECT handler calls this so the will is not
    /// published later.
    #[inline]
    pub fn take_will(&mut self) -> Option<WillMessage> {
        self.will_message.take()
    }

    /// Returns the last packet identifier handed out.
    #[inline]
    #[must_use]
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    /// Allocates the next packet identifier.
    ///
    /// Cycles through 1..=65535; zero is not a valid identifier.
    pub fn next_message_id(&mut self) -> u16 {
        self.message_id = match self.message_id {
            u16::MAX => 1,
            current => current + 1,
        };
        self.message_id
    }
}

// ============================================================================
// Tests
// ============================================================================
