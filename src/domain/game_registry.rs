//! Concurrent game storage with one lock per game.
//!
//! [`GameRegistry`] stores every loaded game in a `HashMap` where each
//! entry is individually protected by a [`tokio::sync::Mutex`]. Commands
//! on the same game run strictly one after another; different games never
//! contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::GameId;
use super::game_entry::{GameEntry, GameSummary};
use crate::error::GatewayError;

/// Central store for all loaded games.
///
/// # Concurrency
///
/// - The outer `RwLock` is only held long enough to find or insert an
///   entry.
/// - Each game's `Mutex` is held for a full command: validation, append,
///   projection update, and publish. This is the per-game serialization
///   point.
#[derive(Debug)]
pub struct GameRegistry {
    games: RwLock<HashMap<GameId, Arc<Mutex<GameEntry>>>>,
}

impl GameRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new game entry into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if a game with the same
    /// ID already exists.
    pub async fn insert(&self, entry: GameEntry) -> Result<GameId, GatewayError> {
        let game_id = entry.game_id();
        let mut map = self.games.write().await;
        if map.contains_key(&game_id) {
            return Err(GatewayError::InvalidRequest(format!(
                "game {game_id} already exists"
            )));
        }
        map.insert(game_id, Arc::new(Mutex::new(entry)));
        Ok(game_id)
    }

    /// Returns the game entry behind its per-game lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GameNotFound`] if no game with the given ID
    /// exists.
    pub async fn get(&self, game_id: GameId) -> Result<Arc<Mutex<GameEntry>>, GatewayError> {
        let map = self.games.read().await;
        map.get(&game_id)
            .cloned()
            .ok_or(GatewayError::GameNotFound(*game_id.as_uuid()))
    }

    /// Returns summaries of all games, optionally filtered by event id,
    /// oldest first.
    pub async fn list(&self, event_id_filter: Option<&str>) -> Vec<GameSummary> {
        let entries: Vec<Arc<Mutex<GameEntry>>> =
            self.games.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry_lock in entries {
            let entry = entry_lock.lock().await;
            if let Some(filter) = event_id_filter
                && entry.projection.session.event_id != filter
            {
                continue;
            }
            summaries.push(GameSummary::from(&*entry));
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.game_id.as_uuid().cmp(b.game_id.as_uuid()))
        });
        summaries
    }

    /// Returns the number of games in the registry.
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    /// Returns `true` if the registry contains no games.
    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
