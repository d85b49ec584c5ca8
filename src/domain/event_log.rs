//! In-memory retained window of a game's event log.
//!
//! Holds the most recent `retention` events for backfill. The durable,
//! complete log lives in PostgreSQL when persistence is enabled; this
//! window only bounds how far back a reconnecting client can replay
//! before it has to take a snapshot instead.

use std::collections::VecDeque;

use super::TimelineEvent;
use crate::error::GatewayError;

/// Bounded, strictly ordered window over one game's events.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<TimelineEvent>,
    head_sequence: u64,
    retention: usize,
}

impl EventLog {
    /// Creates an empty log that keeps at most `retention` events.
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(retention.min(1024)),
            head_sequence: 0,
            retention: retention.max(1),
        }
    }

    /// Appends the next committed event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if `event.sequence_number` is not
    /// exactly `head_sequence + 1`.
    pub fn append(&mut self, event: TimelineEvent) -> Result<(), GatewayError> {
        let expected = self.head_sequence.saturating_add(1);
        if event.sequence_number != expected {
            return Err(GatewayError::Internal(format!(
                "event log for game {} expected sequence {expected}, got {}",
                event.game_id, event.sequence_number
            )));
        }
        self.head_sequence = event.sequence_number;
        self.events.push_back(event);
        while self.events.len() > self.retention {
            self.events.pop_front();
        }
        Ok(())
    }

    /// Sequence number of the newest event (0 when empty).
    #[must_use]
    pub const fn head_sequence(&self) -> u64 {
        self.head_sequence
    }

    /// Sequence number of the oldest retained event.
    #[must_use]
    pub fn oldest_retained(&self) -> Option<u64> {
        self.events.front().map(|e| e.sequence_number)
    }

    /// Returns `true` if every event after `after` is still retained.
    #[must_use]
    pub fn covers(&self, after: u64) -> bool {
        if after >= self.head_sequence {
            return true;
        }
        self.oldest_retained()
            .is_some_and(|oldest| oldest <= after.saturating_add(1))
    }

    /// Returns the retained events with `sequence_number > after`, oldest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RetentionExceeded`] if some of the requested
    /// events have already been dropped from the window.
    pub fn events_after(&self, after: u64) -> Result<Vec<TimelineEvent>, GatewayError> {
        if !self.covers(after) {
            return Err(GatewayError::RetentionExceeded {
                requested: after,
                oldest_retained: self.oldest_retained().unwrap_or(self.head_sequence),
            });
        }
        Ok(self
            .events
            .iter()
            .filter(|e| e.sequence_number > after)
            .cloned()
            .collect())
    }

    /// Number of events currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
