//! Service layer: command orchestration and clock fan-out.
//!
//! [`GameService`] serializes commands per game, commits the resulting
//! events, and publishes them through the [`crate::domain::BroadcastHub`].
//! [`spawn_heartbeat`] periodically publishes derived clock frames.

pub mod game_service;
pub mod heartbeat;

pub use game_service::{Attachment, Backfill, EngineSettings, GameService, NewGame};
pub use heartbeat::spawn_heartbeat;
