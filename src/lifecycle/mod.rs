//! Per-connection lifecycle.
//!
//! Reacts to the four events a link produces over its life: activation,
//! an inbound message or decode failure, an idle notification, and
//! deactivation.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `controller` | Event handling and teardown |
//! | `dispatch` | Downstream dispatcher seam |
//! | `failure` | Failure classification and CONNACK translation |

// ============================================================================
// Submodules
// ============================================================================

/// Event handling and teardown.
pub mod controller;

/// Downstream dispatcher seam.
pub mod dispatch;

/// Failure classification.
pub mod failure;

// ============================================================================
// Re-exports
// ============================================================================

pub use controller::LifecycleController;
pub use dispatch::MessageDispatcher;
pub use failure::{Cause, FailureAction, translate};
