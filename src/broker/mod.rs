//! Broker entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Broker`] | Accepts links and coordinates shutdown |
//! | [`BrokerBuilder`] | Fluent configuration builder |
//! | [`BrokerOptions`] | Idle thresholds and persistence tuning |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for broker configuration.
pub mod builder;

/// Core broker implementation.
pub mod core;

/// Broker options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Broker;
pub use builder::BrokerBuilder;
pub use options::BrokerOptions;
