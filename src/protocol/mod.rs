//! MQTT message types seen by the lifecycle core.
//!
//! Encoding and decoding of control packets is owned by the transport's
//! codec. This module only defines the shapes that cross the boundary.
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`Inbound`] | Client → Broker | Decoded unit or decode failure |
//! | [`Message`] | Client → Broker | Well-formed message for the dispatcher |
//! | [`Outbound`] | Broker → Client | Packet queued on a link |
//! | [`ConnAck`] | Broker → Client | Connection acknowledgment |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connack` | CONNACK, return codes, outbound packets |
//! | `message` | Inbound message model |

// ============================================================================
// Submodules
// ============================================================================

/// CONNACK and outbound packets.
pub mod connack;

/// Inbound message model.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use connack::{ConnAck, ConnectReturnCode, Outbound};
pub use message::{Connect, ControlPacket, Inbound, Message, PacketType, Publish, QoS};
