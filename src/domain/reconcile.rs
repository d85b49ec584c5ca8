//! Sequence-based reconciliation between a client and a game's log.
//!
//! The server side picks how to bring a (re)connecting client up to date
//! with [`plan_resync`]. The client side uses a [`SequenceCursor`] to
//! apply only the exact next sequence number and to notice when one was
//! missed.

use serde::Serialize;
use utoipa::ToSchema;

use super::EventLog;

/// How the server will bring a subscriber up to the head of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPlan {
    /// Client is at head; stream live deltas only.
    Live,
    /// Replay the retained events after the client's sequence, then stream.
    Replay,
    /// Send a full snapshot at head, then stream.
    Snapshot,
}

/// Chooses a [`ResyncPlan`] for a client reporting `last_known_sequence`.
///
/// - `0` means the client has nothing and always gets a snapshot, unless
///   the log itself is empty.
/// - A sequence ahead of head belongs to some other history and also gets
///   a snapshot.
/// - A gap larger than `max_backfill_gap`, or one reaching past the
///   retained window, gets a snapshot.
#[must_use]
pub fn plan_resync(last_known_sequence: u64, log: &EventLog, max_backfill_gap: u64) -> ResyncPlan {
    let head = log.head_sequence();
    if last_known_sequence == head {
        return ResyncPlan::Live;
    }
    if last_known_sequence == 0 || last_known_sequence > head {
        return ResyncPlan::Snapshot;
    }
    let gap = head - last_known_sequence;
    if gap <= max_backfill_gap && log.covers(last_known_sequence) {
        ResyncPlan::Replay
    } else {
        ResyncPlan::Snapshot
    }
}

/// Outcome of offering a sequence number to a [`SequenceCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// Exactly the next sequence; apply it.
    Apply,
    /// Already applied; drop it.
    Duplicate,
    /// One or more events were missed; resync before applying anything.
    Gap {
        /// Sequence the cursor needed.
        expected: u64,
        /// Sequence actually delivered.
        received: u64,
    },
}

/// Tracks the last applied sequence number of one event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCursor {
    last_applied: u64,
}

impl SequenceCursor {
    /// Starts a cursor after `last_applied`.
    #[must_use]
    pub const fn new(last_applied: u64) -> Self {
        Self { last_applied }
    }

    /// Last sequence applied.
    #[must_use]
    pub const fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Checks `sequence` and advances the cursor only on
    /// [`CursorStep::Apply`].
    pub fn observe(&mut self, sequence: u64) -> CursorStep {
        let expected = self.last_applied.saturating_add(1);
        if sequence == expected {
            self.last_applied = sequence;
            CursorStep::Apply
        } else if sequence <= self.last_applied {
            CursorStep::Duplicate
        } else {
            CursorStep::Gap {
                expected,
                received: sequence,
            }
        }
    }

    /// Jumps to `head` after a snapshot has been applied.
    pub fn reset_to(&mut self, head: u64) {
        self.last_applied = head;
    }
}
