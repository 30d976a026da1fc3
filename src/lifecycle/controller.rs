//! Connection lifecycle controller.
//!
//! One controller serves every link. It keeps no per-link state of its
//! own: everything it needs travels on the [`Connection`]. The shared
//! [`ConnectionRegistry`] and [`ClientBindings`] are injected so each test
//! (or each broker) gets isolated instances.
//!
//! # Events
//!
//! | Event | Effect |
//! |-------|--------|
//! | [`on_activate`](LifecycleController::on_activate) | register the link |
//! | [`on_message`](LifecycleController::on_message) | dispatch, or translate a decode failure |
//! | [`on_idle`](LifecycleController::on_idle) | on all-idle: publish will (once), close |
//! | [`on_deactivate`](LifecycleController::on_deactivate) | unregister, unbind, persist session |

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::protocol::{Inbound, Message};
use crate::session::SessionPersister;
use crate::transport::connection::SessionSlot;
use crate::transport::{ClientBindings, Connection, ConnectionRegistry, IdleKind};

use super::MessageDispatcher;
use super::failure::{Cause, translate};

// ============================================================================
// LifecycleController
// ============================================================================

/// Drives registration, dispatch, idle handling and teardown of links.
pub struct LifecycleController {
    /// Live links.
    registry: Arc<ConnectionRegistry>,
    /// Client ID → link.
    bindings: Arc<ClientBindings>,
    /// Downstream protocol handling.
    dispatcher: Arc<dyn MessageDispatcher>,
    /// Background session writer.
    persister: Arc<SessionPersister>,
}

impl LifecycleController {
    /// Creates a controller over the given shared state.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        bindings: Arc<ClientBindings>,
        dispatcher: Arc<dyn MessageDispatcher>,
        persister: Arc<SessionPersister>,
    ) -> Self {
        Self {
            registry,
            bindings,
            dispatcher,
            persister,
        }
    }

    /// Returns the connection registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Returns the client bindings.
    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &Arc<ClientBindings> {
        &self.bindings
    }

    /// Returns the session persister.
    #[inline]
    #[must_use]
    pub fn persister(&self) -> &Arc<SessionPersister> {
        &self.persister
    }
}

// ============================================================================
// LifecycleController - Events
// ============================================================================

impl LifecycleController {
    /// Link became usable.
    pub fn on_activate(&self, connection: &Connection) {
        self.registry.insert(connection);
        connection.mark_active();

        debug!(
            connection_id = %connection.id(),
            peer = ?connection.peer(),
            "Connection active"
        );
    }

    /// Link closed or lost.
    ///
    /// Unregisters the link, removes its client binding if the binding
    /// still points here, and hands a persistent session to the
    /// background persister. Calls after the first are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionMissing`] if a session was attached to the
    /// link and had been taken away before teardown. Registry and binding
    /// cleanup still happen.
    pub fn on_deactivate(&self, connection: &Connection) -> Result<()> {
        if !connection.mark_closed() {
            trace!(connection_id = %connection.id(), "Connection already torn down");
            return Ok(());
        }

        self.registry.remove(connection.id());

        let slot = connection.session_slot();
        let client_id = match &slot {
            SessionSlot::Attached(session) => Some(session.client_id().clone()),
            SessionSlot::Pending | SessionSlot::Detached => connection.client_id(),
        };

        if let Some(client_id) = &client_id {
            self.bindings.unbind_if(client_id, connection.id());
        }

        match slot {
            SessionSlot::Attached(session) if session.clear_session() => {
                debug!(client_id = %session.client_id(), "Clean session discarded");
                Ok(())
            }
            SessionSlot::Attached(session) => {
                debug!(
                    client_id = %session.client_id(),
                    message_id = session.message_id(),
                    "Persisting session"
                );
                self.persister.persist(session);
                Ok(())
            }
            SessionSlot::Pending => {
                debug!(
                    connection_id = %connection.id(),
                    client_id = ?client_id,
                    "Connection closed before CONNECT completed"
                );
                Ok(())
            }
            SessionSlot::Detached => {
                let err = Error::session_missing(
                    connection.id(),
                    client_id.map(|id| id.as_str().to_owned()),
                );
                error!(error = %err, peer = ?connection.peer(), "Teardown invariant violated");
                Err(err)
            }
        }
    }

    /// One decoded unit arrived.
    ///
    /// Decode failures go to the failure translator and are not
    /// dispatched. Messages arriving after a close request are dropped.
    pub async fn on_message(&self, connection: &Connection, inbound: Inbound) {
        match inbound {
            Inbound::Malformed(cause) => self.on_failure(connection, cause),
            Inbound::Message(message) => {
                if !connection.is_open() {
                    trace!(
                        connection_id = %connection.id(),
                        packet_type = ?message.packet_type(),
                        "Message dropped, connection closing"
                    );
                    return;
                }
                self.dispatch(connection, message).await;
            }
        }
    }

    /// Link idle notification.
    ///
    /// Only [`IdleKind::AllIdle`] is acted on: the will (if any) is
    /// dispatched like a client publish, at most once per link, and the
    /// link is closed.
    pub async fn on_idle(&self, connection: &Connection, kind: IdleKind) {
        if kind != IdleKind::AllIdle {
            trace!(connection_id = %connection.id(), ?kind, "Idle notification ignored");
            return;
        }

        let will = connection
            .with_session(|session| session.will().cloned())
            .flatten();

        match will {
            Some(will) if connection.claim_will() => {
                info!(
                    connection_id = %connection.id(),
                    client_id = ?connection.client_id(),
                    topic = %will.topic,
                    "Idle timeout, publishing will"
                );
                self.dispatch(connection, Message::Publish(will.to_publish()))
                    .await;
            }
            Some(_) => {
                debug!(connection_id = %connection.id(), "Will already published");
            }
            None => {
                debug!(connection_id = %connection.id(), "Idle timeout");
            }
        }

        connection.close();
    }

    /// Fails a link for `cause`.
    ///
    /// Writes the translated CONNACK (if any) and closes.
    pub fn on_failure(&self, connection: &Connection, cause: Cause) {
        let client_id = connection.client_id();
        let action = translate(&cause, client_id.as_ref());

        match action.reply {
            Some(connack) => connection.write_and_close(connack),
            None => connection.close(),
        };
    }
}

// ============================================================================
// LifecycleController - Dispatch
// ============================================================================

impl LifecycleController {
    /// Hands a message to the dispatcher, isolating its failures.
    async fn dispatch(&self, connection: &Connection, message: Message) {
        let outcome = AssertUnwindSafe(self.dispatcher.dispatch(connection, message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.on_failure(connection, Cause::from(e)),
            Err(panic) => {
                let err = Error::dispatch(format!(
                    "dispatcher panicked: {}",
                    panic_message(panic.as_ref())
                ));
                self.on_failure(connection, Cause::from(err));
            }
        }
    }
}

/// Extracts the message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    }
}

// ============================================================================
// Tests
// ============================================================================
