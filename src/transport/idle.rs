//! Idle detection for a single link.
//!
//! Three independent thresholds, each optional:
//!
//! | Kind | Fires when |
//! |------|------------|
//! | [`IdleKind::ReaderIdle`] | nothing read for `reader` |
//! | [`IdleKind::WriterIdle`] | nothing written for `writer` |
//! | [`IdleKind::AllIdle`] | nothing read *or* written for `all` |
//!
//! A kind fires once per idle period and re-arms on the matching
//! activity. The tracker is driven with explicit instants so the link loop
//! owns the clock.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

// ============================================================================
// IdleKind
// ============================================================================

/// Which direction went quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdleKind {
    /// No inbound traffic.
    ReaderIdle,
    /// No outbound traffic.
    WriterIdle,
    /// No traffic in either direction.
    AllIdle,
}

// ============================================================================
// IdleTimeouts
// ============================================================================

/// Idle thresholds for a link. `None` disables a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimeouts {
    /// Reader idle threshold.
    pub reader: Option<Duration>,
    /// Writer idle threshold.
    pub writer: Option<Duration>,
    /// All idle threshold.
    pub all: Option<Duration>,
}

impl IdleTimeouts {
    /// Default all-idle threshold (1.5 x a 60 s keep alive).
    pub const DEFAULT_ALL_IDLE: Duration = Duration::from_secs(90);

    /// No idle detection at all.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            reader: None,
            writer: None,
            all: None,
        }
    }

    /// Only all-idle detection.
    #[inline]
    #[must_use]
    pub const fn all_idle(threshold: Duration) -> Self {
        Self {
            reader: None,
            writer: None,
            all: Some(threshold),
        }
    }

    /// Returns `true` if no kind is enabled.
    #[inline]
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.reader.is_none() && self.writer.is_none() && self.all.is_none()
    }
}

impl Default for IdleTimeouts {
    fn default() -> Self {
        Self::all_idle(Self::DEFAULT_ALL_IDLE)
    }
}

// ============================================================================
// IdleTracker
// ============================================================================

/// Activity bookkeeping for one link.
#[derive(Debug)]
pub(crate) struct IdleTracker {
    timeouts: IdleTimeouts,
    last_read: Instant,
    last_write: Instant,
    /// Already reported in the current idle period: reader, writer, all.
    reported: [bool; 3],
}

impl IdleTracker {
    /// Starts tracking with both directions considered active at `now`.
    pub(crate) fn new(timeouts: IdleTimeouts, now: Instant) -> Self {
        Self {
            timeouts,
            last_read: now,
            last_write: now,
            reported: [false; 3],
        }
    }

    /// Records inbound traffic.
    pub(crate) fn on_read(&mut self, now: Instant) {
        self.last_read = now;
        self.reported[0] = false;
        self.reported[2] = false;
    }

    /// Records outbound traffic.
    pub(crate) fn on_write(&mut self, now: Instant) {
        self.last_write = now;
        self.reported[1] = false;
        self.reported[2] = false;
    }

    /// Deadline per kind, `None` if disabled or already reported.
    ///
    /// A threshold too large to add to an [`Instant`] never fires.
    fn deadlines(&self) -> [(IdleKind, Option<Instant>); 3] {
        let last_any = self.last_read.max(self.last_write);
        let arm = |reported: bool, base: Instant, threshold: Option<Duration>| {
            threshold
                .filter(|_| !reported)
                .and_then(|t| base.checked_add(t))
        };

        [
            (
                IdleKind::ReaderIdle,
                arm(self.reported[0], self.last_read, self.timeouts.reader),
            ),
            (
                IdleKind::WriterIdle,
                arm(self.reported[1], self.last_write, self.timeouts.writer),
            ),
            (
                IdleKind::AllIdle,
                arm(self.reported[2], last_any, self.timeouts.all),
            ),
        ]
    }

    /// Earliest pending deadline.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadlines()
            .into_iter()
            .filter_map(|(_, deadline)| deadline)
            .min()
    }

    /// Returns the kinds that have gone idle by `now` and marks them reported.
    pub(crate) fn poll_expired(&mut self, now: Instant) -> Vec<IdleKind> {
        let mut expired = Vec::new();

        for (index, (kind, deadline)) in self.deadlines().into_iter().enumerate() {
            if deadline.is_some_and(|d| d <= now) {
                self.reported[index] = true;
                expired.push(kind);
            }
        }

        expired
    }
}

// ============================================================================
// Tests
// ============================================================================
