//! Per-connection handle and state.
//!
//! A [`Connection`] is the typed state one link carries for its whole
//! life: its ID, the attached [`Session`], the negotiated [`ClientId`] and
//! the link state. Cloning is cheap; every clone refers to the same link.
//!
//! Writes and close requests travel over a channel to the link task that
//! owns the socket, so every method here is non-blocking.
//!
//! # States
//!
//! ```text
//! Activating ──► Active ──► Closing ──► Closed
//!      │                       ▲          ▲
//!      └───────────────────────┘          │
//!      └──────────────────────────────────┘  (peer gone)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{ClientId, ConnectionId};
use crate::protocol::Outbound;
use crate::session::Session;

// ============================================================================
// LinkState
// ============================================================================

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    /// Accepted, not yet registered.
    Activating = 0,
    /// Registered and processing traffic.
    Active = 1,
    /// Close requested; no further dispatch.
    Closing = 2,
    /// Torn down. Terminal.
    Closed = 3,
}

impl LinkState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Activating,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// ============================================================================
// LinkCommand
// ============================================================================

/// Request from a [`Connection`] handle to the task owning the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Write a packet.
    Send(Outbound),
    /// Write a packet, flush, then close.
    SendAndClose(Outbound),
    /// Close without writing.
    Close,
}

// ============================================================================
// Session Slot
// ============================================================================

/// What the link knows about its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionSlot {
    /// CONNECT not completed yet.
    Pending,
    /// Session attached by the connect handler.
    Attached(Session),
    /// Session was attached and has since been taken away.
    Detached,
}

// ============================================================================
// Connection
// ============================================================================

/// Shared state of one link.
struct ConnectionInner {
    /// Link identifier.
    id: ConnectionId,
    /// Remote address, when the transport knows it.
    peer: Option<SocketAddr>,
    /// Current [`LinkState`] as `u8`.
    state: AtomicU8,
    /// Attached session.
    session: Mutex<SessionSlot>,
    /// Client identifier, cached for error paths before a session exists.
    client_id: Mutex<Option<ClientId>>,
    /// Set once the will has been handed to the dispatcher.
    will_claimed: AtomicBool,
    /// Commands for the link task.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

/// Handle to one live transport link.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Only the link's own task drives
/// lifecycle events; any task may queue writes or request a close.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Creates a handle for a new link.
    ///
    /// Returns the handle and the receiving end of its command channel,
    /// which belongs to whatever task owns the socket.
    #[must_use]
    pub fn new(peer: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<LinkCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let inner = ConnectionInner {
            id: ConnectionId::next(),
            peer,
            state: AtomicU8::new(LinkState::Activating as u8),
            session: Mutex::new(SessionSlot::Pending),
            client_id: Mutex::new(None),
            will_claimed: AtomicBool::new(false),
            command_tx,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            command_rx,
        )
    }

    /// Returns the link ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the link accepts traffic.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state(), LinkState::Activating | LinkState::Active)
    }
}

// ============================================================================
// Connection - Session & Client ID
// ============================================================================

impl Connection {
    /// Attaches a session, also caching its client ID.
    ///
    /// Returns the previously attached session, if any.
    pub fn attach_session(&self, session: Session) -> Option<Session> {
        *self.inner.client_id.lock() = Some(session.client_id().clone());

        let previous = std::mem::replace(
            &mut *self.inner.session.lock(),
            SessionSlot::Attached(session),
        );

        match previous {
            SessionSlot::Attached(previous) => Some(previous),
            SessionSlot::Pending | SessionSlot::Detached => None,
        }
    }

    /// Takes the session away from this link.
    ///
    /// The link must not reach teardown afterwards unless a new session is
    /// attached; teardown reports that as [`Error::SessionMissing`].
    pub fn detach_session(&self) -> Option<Session> {
        let mut slot = self.inner.session.lock();
        match std::mem::replace(&mut *slot, SessionSlot::Detached) {
            SessionSlot::Attached(session) => Some(session),
            SessionSlot::Pending => {
                *slot = SessionSlot::Pending;
                None
            }
            SessionSlot::Detached => None,
        }
    }

    /// Returns `true` if a session is attached.
    #[inline]
    #[must_use]
    pub fn has_session(&self) -> bool {
        matches!(*self.inner.session.lock(), SessionSlot::Attached(_))
    }

    /// Runs `f` against the attached session.
    ///
    /// Returns `None` if no session is attached. `f` runs under the
    /// session lock and must not block.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        match &mut *self.inner.session.lock() {
            SessionSlot::Attached(session) => Some(f(session)),
            SessionSlot::Pending | SessionSlot::Detached => None,
        }
    }

    /// Returns a copy of the attached session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.with_session(|session| session.clone())
    }

    /// Returns the raw session slot.
    pub(crate) fn session_slot(&self) -> SessionSlot {
        self.inner.session.lock().clone()
    }

    /// Caches the client ID before a session exists.
    pub fn set_client_id(&self, client_id: ClientId) {
        *self.inner.client_id.lock() = Some(client_id);
    }

    /// Returns the cached client ID.
    #[must_use]
    pub fn client_id(&self) -> Option<ClientId> {
        self.inner.client_id.lock().clone()
    }
}

// ============================================================================
// Connection - Output
// ============================================================================

impl Connection {
    /// Queues a packet for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once a close has been requested
    /// or the link task is gone.
    pub fn send(&self, packet: impl Into<Outbound>) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        self.inner
            .command_tx
            .send(LinkCommand::Send(packet.into()))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Requests the link be closed.
    ///
    /// Only the first close request on a link has any effect. Returns
    /// `true` if this call initiated the close.
    pub fn close(&self) -> bool {
        if !self.begin_close() {
            return false;
        }

        trace!(connection_id = %self.id(), "Close requested");
        let _ = self.inner.command_tx.send(LinkCommand::Close);
        true
    }

    /// Writes one final packet, then closes.
    ///
    /// Returns `true` if this call initiated the close; otherwise the
    /// packet is discarded.
    pub fn write_and_close(&self, packet: impl Into<Outbound>) -> bool {
        if !self.begin_close() {
            return false;
        }

        trace!(connection_id = %self.id(), "Write-then-close requested");
        let _ = self
            .inner
            .command_tx
            .send(LinkCommand::SendAndClose(packet.into()));
        true
    }

    /// Moves an open link to [`LinkState::Closing`].
    fn begin_close(&self) -> bool {
        self.inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match LinkState::from_u8(raw) {
                    LinkState::Activating | LinkState::Active => Some(LinkState::Closing as u8),
                    LinkState::Closing | LinkState::Closed => None,
                }
            })
            .is_ok()
    }
}

// ============================================================================
// Connection - Lifecycle Guards
// ============================================================================

impl Connection {
    /// Moves [`LinkState::Activating`] to [`LinkState::Active`].
    pub(crate) fn mark_active(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                LinkState::Activating as u8,
                LinkState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves the link to [`LinkState::Closed`].
    ///
    /// Returns `false` if it was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        self.inner
            .state
            .swap(LinkState::Closed as u8, Ordering::AcqRel)
            != LinkState::Closed as u8
    }

    /// Claims the right to publish this link's will.
    ///
    /// Returns `true` exactly once per link.
    pub(crate) fn claim_will(&self) -> bool {
        !self.inner.will_claimed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("state", &self.state())
            .field("client_id", &self.client_id())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::{ConnAck, ConnectReturnCode};

    #[test]
    fn test_new_connection_is_activating() {
        let (conn, _rx) = Connection::new(None);
        assert_eq!(conn.state(), LinkState::Activating);
        assert!(conn.is_open());
        assert!(!conn.has_session());
        assert!(conn.client_id().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let (conn, _rx) = Connection::new(None);
        let other = conn.clone();
        conn.attach_session(Session::new("c1", true));
        assert!(other.has_session());
        assert_eq!(other.id(), conn.id());
    }

    #[test]
    fn test_attach_session_caches_client_id() {
        let (conn, _rx) = Connection::new(None);
        assert!(conn.attach_session(Session::new("c1", false)).is_none());
        assert_eq!(conn.client_id(), Some(ClientId::from("c1")));

        let previous = conn.attach_session(Session::new("c1", true));
        assert!(previous.is_some_and(|s| !s.clear_session()));
    }

    #[test]
    fn test_detach_session() {
        let (conn, _rx) = Connection::new(None);
        assert!(conn.detach_session().is_none());
        assert_eq!(conn.session_slot(), SessionSlot::Pending);

        conn.attach_session(Session::new("c1", false));
        assert!(conn.detach_session().is_some());
        assert_eq!(conn.session_slot(), SessionSlot::Detached);
        assert!(conn.with_session(|_| ()).is_none());
    }

    #[test]
    fn test_with_session_mutates_in_place() {
        let (conn, _rx) = Connection::new(None);
        conn.attach_session(Session::new("c1", false));
        let id = conn.with_session(Session::next_message_id);
        assert_eq!(id, Some(1));
        assert_eq!(conn.session().map(|s| s.message_id()), Some(1));
    }

    #[test]
    fn test_send_queues_command() {
        let (conn, mut rx) = Connection::new(None);
        conn.send(ConnAck::accepted(false)).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkCommand::Send(Outbound::ConnAck(ConnAck::accepted(false)))
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let (conn, mut rx) = Connection::new(None);
        assert!(conn.close());
        assert!(!conn.close());
        assert_eq!(conn.state(), LinkState::Closing);

        assert_eq!(rx.try_recv().unwrap(), LinkCommand::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_write_and_close_after_close_is_dropped() {
        let (conn, mut rx) = Connection::new(None);
        let refusal = ConnAck::refused(ConnectReturnCode::NotAuthorized);

        assert!(conn.write_and_close(refusal));
        assert!(!conn.write_and_close(refusal));
        assert!(!conn.close());

        assert_eq!(
            rx.try_recv().unwrap(),
            LinkCommand::SendAndClose(Outbound::ConnAck(refusal))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_close_fails() {
        let (conn, _rx) = Connection::new(None);
        conn.close();
        let result = conn.send(ConnAck::accepted(false));
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_send_without_receiver_fails() {
        let (conn, rx) = Connection::new(None);
        drop(rx);
        assert!(conn.send(ConnAck::accepted(false)).is_err());
    }

    #[test]
    fn test_lifecycle_guards() {
        let (conn, _rx) = Connection::new(None);
        assert!(conn.mark_active());
        assert!(!conn.mark_active());
        assert_eq!(conn.state(), LinkState::Active);

        assert!(conn.mark_closed());
        assert!(!conn.mark_closed());
        assert!(!conn.is_open());
        assert!(!conn.close());
    }

    #[test]
    fn test_claim_will_once() {
        let (conn, _rx) = Connection::new(None);
        assert!(conn.claim_will());
        assert!(!conn.claim_will());
    }
}
