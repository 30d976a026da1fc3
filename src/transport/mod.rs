//! Link-level transport.
//!
//! The wire codec lives outside this crate. A link is handed over as a
//! stream of decoded [`Inbound`](crate::protocol::Inbound) units and a sink
//! of [`Outbound`](crate::protocol::Outbound) packets, and this module
//! provides the per-link handle, the shared tables and the event loop
//! that ties them to the lifecycle controller.
//!
//! # Link Lifecycle
//!
//! ```text
//! Activating ──on_activate──► Active ──close()──► Closing ──teardown──► Closed
//!      │                         │                                        ▲
//!      └─────────────────────────┴──────── peer EOF / error ──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Cloneable link handle |
//! | `registry` | Live link set |
//! | `bindings` | Client ID to link map |
//! | `idle` | Idle thresholds and tracking |
//! | `link` | Per-link event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Cloneable link handle.
pub mod connection;

/// Live link set.
pub mod registry;

/// Client ID to link map.
pub mod bindings;

/// Idle detection.
pub mod idle;

/// Per-link event loop.
pub(crate) mod link;

// ============================================================================
// Re-exports
// ============================================================================

pub use bindings::ClientBindings;
pub use connection::{Connection, LinkCommand, LinkState};
pub use idle::{IdleKind, IdleTimeouts};
pub use registry::ConnectionRegistry;
