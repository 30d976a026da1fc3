//! Builder pattern for broker configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use mqtt_lifecycle::{Broker, Connection, Message, MessageDispatcher, Result};
//!
//! struct Router;
//!
//! #[async_trait]
//! impl MessageDispatcher for Router {
//!     async fn dispatch(&self, _connection: &Connection, _message: Message) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn example() -> Result<()> {
//! let broker = Broker::builder().dispatcher(Arc::new(Router)).build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lifecycle::MessageDispatcher;
use crate::session::{MemorySessionStore, SessionStore};

use super::core::Broker;
use super::options::BrokerOptions;

// ============================================================================
// BrokerBuilder
// ============================================================================

/// Builder for configuring a [`Broker`] instance.
///
/// Use [`Broker::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct BrokerBuilder {
    /// Downstream message handling.
    dispatcher: Option<Arc<dyn MessageDispatcher>>,
    /// Session backend.
    session_store: Option<Arc<dyn SessionStore>>,
    /// Tuning.
    options: BrokerOptions,
}

impl fmt::Debug for BrokerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerBuilder")
            .field("dispatcher", &self.dispatcher.is_some())
            .field("session_store", &self.session_store.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// BrokerBuilder Implementation
// ============================================================================

impl BrokerBuilder {
    /// Creates a new builder with default options and no dispatcher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dispatcher every well-formed message is handed to.
    #[inline]
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets where persistent sessions are written.
    ///
    /// Defaults to a [`MemorySessionStore`].
    #[inline]
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Sets the broker options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BrokerOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the broker with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no dispatcher is set
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<Broker> {
        let dispatcher = self.dispatcher.ok_or_else(|| {
            Error::config(
                "A message dispatcher is required. Use .dispatcher() to set it.\n\
                 Example: Broker::builder().dispatcher(Arc::new(MyDispatcher))",
            )
        })?;

        self.options.validate()?;

        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        Ok(Broker::new(dispatcher, session_store, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================
