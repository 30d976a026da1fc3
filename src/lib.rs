//! MQTT lifecycle - per-connection core of an MQTT broker.
//!
//! This library owns everything that happens to a client link between
//! "socket accepted" and "socket gone", and nothing protocol-specific in
//! between. Decoding, CONNECT handling, routing and QoS state live behind
//! the [`MessageDispatcher`] seam.
//!
//! # Architecture
//!
//! ```text
//!   codec ──Stream<Inbound>──►┌───────────┐──dispatch──► MessageDispatcher
//!                             │ link task │
//!   codec ◄──Sink<Outbound>───└───────────┘
//!                                   │ on_activate / on_message / on_idle / on_deactivate
//!                                   ▼
//!                          LifecycleController ──► ConnectionRegistry
//!                                   │            ──► ClientBindings
//!                                   └──────────────► SessionPersister ──► SessionStore
//! ```
//!
//! Key behaviours:
//!
//! - Decode, authentication and authorization failures become the matching
//!   CONNACK refusal followed by a close; everything else closes silently
//! - A link idle in both directions publishes its will (once) and closes
//! - Teardown removes the client binding only if it still points at the
//!   link being torn down, and persists non-clean sessions in the background
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use mqtt_lifecycle::{Broker, Connection, Message, MessageDispatcher, Result, Session};
//!
//! struct Connector;
//!
//! #[async_trait]
//! impl MessageDispatcher for Connector {
//!     async fn dispatch(&self, connection: &Connection, message: Message) -> Result<()> {
//!         if let Message::Connect(connect) = message {
//!             let mut session = Session::new(connect.client_id, connect.clean_session);
//!             session.set_will(connect.will);
//!             connection.attach_session(session);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # fn example() -> Result<()> {
//! let broker = Broker::builder().dispatcher(Arc::new(Connector)).build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`broker`] | Entry point: [`Broker`], [`BrokerBuilder`], [`BrokerOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`lifecycle`] | Lifecycle controller and failure translation |
//! | [`protocol`] | Decoded message model and outbound packets |
//! | [`session`] | Session state, stores and background persistence |
//! | [`transport`] | Connection handle, shared tables, idle detection |

// ============================================================================
// Modules
// ============================================================================

/// Broker entry point.
///
/// Use [`Broker::builder()`] to create a configured broker.
pub mod broker;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for links and clients.
pub mod identifiers;

/// Per-connection lifecycle handling.
pub mod lifecycle;

/// Decoded MQTT message model.
pub mod protocol;

/// Session state and persistence.
pub mod session;

/// Link handle, registries and the per-link event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Broker types
pub use broker::{Broker, BrokerBuilder, BrokerOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ClientId, ConnectionId};

// Lifecycle types
pub use lifecycle::{Cause, FailureAction, LifecycleController, MessageDispatcher};

// Protocol types
pub use protocol::{
    ConnAck, Connect, ConnectReturnCode, ControlPacket, Inbound, Message, Outbound, PacketType,
    Publish, QoS,
};

// Session types
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, WillMessage};

// Transport types
pub use transport::{
    ClientBindings, Connection, ConnectionRegistry, IdleKind, IdleTimeouts, LinkState,
};
