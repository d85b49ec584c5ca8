//! Per-game idempotency cache keyed by client request id.
//!
//! A retried command with the same request id gets the stored outcome
//! back instead of being executed again. Only accepted commands are
//! cached: a rejected command changed nothing and may be retried under
//! the same key once its precondition holds.

use std::collections::{HashMap, VecDeque};

use super::GameCommand;
use crate::error::GatewayError;

/// Bounded FIFO map of `request_id → (command, outcome)`.
#[derive(Debug, Clone)]
pub struct IdempotencyCache<T> {
    entries: HashMap<String, (GameCommand, T)>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<T: Clone> IdempotencyCache<T> {
    /// Creates a cache holding at most `capacity` outcomes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the stored outcome for `request_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IdempotencyKeyReused`] if the key was
    /// recorded for a different command.
    pub fn lookup(&self, request_id: &str, command: &GameCommand) -> Result<Option<T>, GatewayError> {
        match self.entries.get(request_id) {
            None => Ok(None),
            Some((stored, outcome)) if stored == command => Ok(Some(outcome.clone())),
            Some(_) => Err(GatewayError::IdempotencyKeyReused(request_id.to_string())),
        }
    }

    /// Records the outcome of an accepted command, evicting the oldest
    /// entry when full.
    pub fn record(&mut self, request_id: &str, command: GameCommand, outcome: T) {
        if self
            .entries
            .insert(request_id.to_string(), (command, outcome))
            .is_none()
        {
            self.order.push_back(request_id.to_string());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Number of cached outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
