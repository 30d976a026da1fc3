//! Client sessions and their persistence.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Session`] and [`WillMessage`] |
//! | `store` | [`SessionStore`] trait and backends |
//! | `persister` | Bounded background writer |

// ============================================================================
// Submodules
// ============================================================================

/// Session state.
pub mod core;

/// Session persistence backends.
pub mod store;

/// Background session writer.
pub mod persister;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Session, WillMessage};
pub use persister::SessionPersister;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
