//! Per-game broadcast channels for committed events and clock frames.
//!
//! [`BroadcastHub`] keeps one [`tokio::sync::broadcast`] channel per game.
//! Every subscriber of a game receives that game's updates in commit
//! order. Delivery across a disconnect, or past a lagging receiver's
//! ring buffer, is not guaranteed; reconciliation covers that.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::{ClockState, GameId, TimelineEvent};

/// Message fanned out to a game's subscribers.
#[derive(Debug, Clone)]
pub enum GameUpdate {
    /// A committed, sequence-numbered event.
    Event(Arc<TimelineEvent>),
    /// A derived clock frame. Carries no sequence number.
    Clock(Arc<ClockState>),
}

impl GameUpdate {
    /// Sequence number for event updates.
    #[must_use]
    pub fn sequence_number(&self) -> Option<u64> {
        match self {
            Self::Event(event) => Some(event.sequence_number),
            Self::Clock(_) => None,
        }
    }
}

/// Registry of per-game subscriber sets.
#[derive(Debug)]
pub struct BroadcastHub {
    channels: RwLock<HashMap<GameId, broadcast::Sender<GameUpdate>>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Creates a hub whose per-game channels buffer `capacity` updates.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Adds a subscriber to `game_id`, creating the channel on first use.
    ///
    /// The receiver sees every update published after this call returns.
    #[must_use]
    pub fn subscribe(&self, game_id: GameId) -> broadcast::Receiver<GameUpdate> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes an update to all current subscribers of `game_id`.
    ///
    /// Returns the number of receivers reached; 0 if nobody is listening.
    pub fn publish(&self, game_id: GameId, update: GameUpdate) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(&game_id)
            .map_or(0, |sender| sender.send(update).unwrap_or(0))
    }

    /// Current number of subscribers of `game_id`.
    #[must_use]
    pub fn subscriber_count(&self, game_id: GameId) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(&game_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Games with at least one subscriber. Channels nobody listens to any
    /// more are dropped as a side effect.
    pub fn active_games(&self) -> Vec<GameId> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels.keys().copied().collect()
    }
}
