//! Periodic clock fan-out.
//!
//! The heartbeat does not drive the clock. It only observes each game
//! that has subscribers, which commits any level advance that has come
//! due and publishes a fresh [`crate::domain::ClockState`] frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::GameService;

/// Spawns the heartbeat loop on the current runtime.
pub fn spawn_heartbeat(service: Arc<GameService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            beat(&service).await;
        }
    })
}

async fn beat(service: &GameService) {
    for game_id in service.hub().active_games() {
        if let Err(err) = service.heartbeat(game_id).await {
            tracing::warn!(%game_id, error = %err, "heartbeat failed");
        }
    }
}
