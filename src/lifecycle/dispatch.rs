//! Message dispatcher seam.
//!
//! Everything protocol-specific (CONNECT handling, topic routing, QoS
//! state) sits behind [`MessageDispatcher`]. The lifecycle controller
//! hands it each well-formed message verbatim and never looks inside.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Message;
use crate::transport::Connection;

// ============================================================================
// MessageDispatcher
// ============================================================================

/// Downstream consumer of decoded messages.
///
/// Called from the link's own task, one message at a time per link.
/// Implementations may attach sessions, bind client IDs and write to the
/// connection. A returned error is classified with
/// [`Cause::from`](crate::lifecycle::Cause) and fails the link; it is
/// never retried.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Handles one message from `connection`.
    async fn dispatch(&self, connection: &Connection, message: Message) -> Result<()>;
}
