//! Background session persistence.
//!
//! Teardown runs on the link's own task, and a slow store must not hold
//! it up. [`SessionPersister::persist`] hands the session to a background
//! task and returns immediately; at most `concurrency` writes run at once.
//! Failures are logged, never returned to the caller.
//!
//! Writes for one client never overlap. While a write for a client is in
//! flight, later sessions for that client are queued in a single slot and
//! the newest one replaces any older one still waiting, so the last
//! session handed in is the last one written.

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use crate::identifiers::ClientId;

use super::{Session, SessionStore};

// ============================================================================
// Types
// ============================================================================

/// Clients with a write in flight, and the session queued behind it.
type Lanes = Arc<Mutex<FxHashMap<ClientId, Option<Session>>>>;

// ============================================================================
// SessionPersister
// ============================================================================

/// Bounded fire-and-forget writer in front of a [`SessionStore`].
pub struct SessionPersister {
    /// Backend receiving the writes.
    store: Arc<dyn SessionStore>,
    /// Limits concurrent writes.
    permits: Arc<Semaphore>,
    /// Per-client write queues.
    lanes: Lanes,
    /// Outstanding writes.
    tasks: Mutex<JoinSet<()>>,
}

impl SessionPersister {
    /// Creates a persister allowing `concurrency` writes in parallel.
    ///
    /// The concurrency is clamped to `1..=Semaphore::MAX_PERMITS`.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, concurrency: usize) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS))),
            lanes: Arc::new(Mutex::new(FxHashMap::default())),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Returns the backing store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Schedules a session write and returns without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn persist(&self, session: Session) {
        let client_id = session.client_id().clone();

        {
            let mut lanes = self.lanes.lock();
            if let Some(queued) = lanes.get_mut(&client_id) {
                if queued.replace(session).is_some() {
                    trace!(client_id = %client_id, "Queued session superseded");
                }
                return;
            }
            lanes.insert(client_id.clone(), None);
        }

        let store = Arc::clone(&self.store);
        let permits = Arc::clone(&self.permits);
        let lanes = Arc::clone(&self.lanes);

        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let mut next = Some(session);

            while let Some(session) = next {
                write(&*store, &permits, &client_id, session).await;

                let mut queue = lanes.lock();
                next = queue.get_mut(&client_id).and_then(Option::take);
                if next.is_none() {
                    queue.remove(&client_id);
                }
            }
        });
    }

    /// Returns the number of writes not yet reaped.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Waits until every scheduled write has finished.
    pub async fn drain(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                break;
            }

            while let Some(result) = batch.join_next().await {
                if let Err(e) = result
                    && e.is_panic()
                {
                    error!(error = %e, "Session persister task panicked");
                }
            }
        }
    }
}

/// Writes one session under a permit.
///
/// A panicking store is contained here so the client's lane is always
/// released.
async fn write(store: &dyn SessionStore, permits: &Semaphore, client_id: &ClientId, session: Session) {
    let Ok(_permit) = permits.acquire().await else {
        warn!(client_id = %client_id, "Persister closed, session dropped");
        return;
    };

    match AssertUnwindSafe(store.persist(session)).catch_unwind().await {
        Ok(Ok(())) => debug!(client_id = %client_id, "Session persisted"),
        Ok(Err(e)) => error!(client_id = %client_id, error = %e, "Session persistence failed"),
        Err(_) => error!(client_id = %client_id, "Session store panicked"),
    }
}

// ============================================================================
// Tests
// ============================================================================
