//! Broker coordinator.
//!
//! The [`Broker`] owns the shared tables and the lifecycle controller,
//! accepts decoded links and spawns one event loop task per link.
//!
//! # Example
//!
//! ```no_run
//! use std::io;
//! use std::sync::Arc;
//!
//! use futures_util::{Sink, Stream};
//! use mqtt_lifecycle::{Broker, Inbound, MessageDispatcher, Outbound, Result};
//!
//! # async fn example(
//! #     dispatcher: Arc<dyn MessageDispatcher>,
//! #     reader: impl Stream<Item = Inbound> + Unpin + Send + 'static,
//! #     writer: impl Sink<Outbound, Error = io::Error> + Unpin + Send + 'static,
//! # ) -> Result<()> {
//! let broker = Broker::builder().dispatcher(dispatcher).build()?;
//!
//! // `reader` and `writer` come from the MQTT codec over a socket.
//! let connection = broker.accept(None, reader, writer);
//! println!("accepted {}", connection.id());
//!
//! broker.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{Sink, Stream};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::lifecycle::{Cause, LifecycleController, MessageDispatcher};
use crate::protocol::{Inbound, Outbound};
use crate::session::{SessionPersister, SessionStore};
use crate::transport::link::run_link;
use crate::transport::{ClientBindings, Connection, ConnectionRegistry};

use super::builder::BrokerBuilder;
use super::options::BrokerOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the broker.
pub(crate) struct BrokerInner {
    /// Lifecycle event handling, shared by every link.
    pub controller: Arc<LifecycleController>,

    /// Session backend.
    pub session_store: Arc<dyn SessionStore>,

    /// Options applied to accepted links.
    pub options: BrokerOptions,

    /// Running link tasks.
    pub links: Mutex<JoinSet<()>>,
}

// ============================================================================
// Broker
// ============================================================================

/// Per-connection core of an MQTT broker.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Broker {
    /// Shared inner state.
    pub(crate) inner: Arc<BrokerInner>,
}

// ============================================================================
// Broker - Display
// ============================================================================

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("options", &self.inner.options)
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Broker - Public API
// ============================================================================

impl Broker {
    /// Creates a configuration builder for the broker.
    #[inline]
    #[must_use]
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }

    /// Wires the shared state. Options must already be validated.
    pub(crate) fn new(
        dispatcher: Arc<dyn MessageDispatcher>,
        session_store: Arc<dyn SessionStore>,
        options: BrokerOptions,
    ) -> Self {
        let persister = Arc::new(SessionPersister::new(
            Arc::clone(&session_store),
            options.persist_concurrency,
        ));

        let controller = Arc::new(LifecycleController::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ClientBindings::new()),
            dispatcher,
            persister,
        ));

        Self {
            inner: Arc::new(BrokerInner {
                controller,
                session_store,
                options,
                links: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Accepts a decoded link and spawns its event loop.
    ///
    /// The link is registered before this returns. Must be called from
    /// within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `peer` - Remote address, if known
    /// * `reader` - Decoded inbound units, ends on peer close
    /// * `writer` - Encoder for outbound packets
    pub fn accept<R, W>(&self, peer: Option<SocketAddr>, reader: R, writer: W) -> Connection
    where
        R: Stream<Item = Inbound> + Unpin + Send + 'static,
        W: Sink<Outbound> + Unpin + Send + 'static,
        W::Error: Into<Cause>,
    {
        let (connection, commands) = Connection::new(peer);

        let link = run_link(
            connection.clone(),
            reader,
            writer,
            commands,
            Arc::clone(&self.inner.controller),
            self.inner.options.idle,
        );

        let connection_id = connection.id();
        let mut links = self.inner.links.lock();
        while links.try_join_next().is_some() {}

        links.spawn(async move {
            if let Err(e) = link.await {
                debug!(connection_id = %connection_id, error = %e, "Link ended with teardown error");
            }
        });

        connection
    }

    /// Returns the number of live links.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.controller.registry().len()
    }

    /// Returns the live link registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.inner.controller.registry()
    }

    /// Returns the client ID bindings.
    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &Arc<ClientBindings> {
        self.inner.controller.bindings()
    }

    /// Returns the lifecycle controller.
    #[inline]
    #[must_use]
    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.inner.controller
    }

    /// Returns the session store.
    #[inline]
    #[must_use]
    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session_store
    }

    /// Returns the broker options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BrokerOptions {
        &self.inner.options
    }

    /// Closes every link, waits for their teardown, then waits for
    /// pending session writes.
    pub async fn shutdown(&self) {
        info!(count = self.connection_count(), "Shutting down broker");

        loop {
            for connection in self.registry().snapshot() {
                connection.close();
            }

            let mut links = std::mem::take(&mut *self.inner.links.lock());
            if links.is_empty() {
                break;
            }

            while let Some(result) = links.join_next().await {
                if let Err(e) = result
                    && e.is_panic()
                {
                    error!(error = %e, "Link task panicked");
                }
            }
        }

        self.inner.controller.persister().drain().await;
        info!("Broker shut down");
    }
}
