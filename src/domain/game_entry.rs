//! Per-game aggregate held by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::clock::derive_clock;
use super::{
    ClockState, EventLog, GameId, GameProjection, GameSession, IdempotencyCache, Participant,
    ParticipantStatus, SessionStatus, TimelineEvent,
};

/// Result of a committed command, as returned to the caller and as
/// replayed for a repeated idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommandOutcome {
    /// Game the command ran against.
    pub game_id: GameId,
    /// Caller's idempotency key.
    pub request_id: String,
    /// Events committed by the command, implicit level advances included.
    pub events: Vec<TimelineEvent>,
    /// Head sequence after the commit.
    pub head_sequence: u64,
}

/// Everything the engine keeps in memory for one game.
///
/// The registry wraps each entry in its own mutex; holding that lock is
/// what serializes commands for the game.
#[derive(Debug)]
pub struct GameEntry {
    /// Session and roster at `log.head_sequence()`.
    pub projection: GameProjection,
    /// Retained tail of the event log.
    pub log: EventLog,
    /// Recently completed commands by request id.
    pub idempotency: IdempotencyCache<CommandOutcome>,
}

impl GameEntry {
    /// Creates an entry from a projection and the log it was folded from.
    #[must_use]
    pub fn new(
        projection: GameProjection,
        log: EventLog,
        idempotency: IdempotencyCache<CommandOutcome>,
    ) -> Self {
        Self {
            projection,
            log,
            idempotency,
        }
    }

    /// Game identifier.
    #[must_use]
    pub const fn game_id(&self) -> GameId {
        self.projection.session.id
    }
}

/// Full game state at one head sequence, with the clock derived for
/// `server_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GameSnapshot {
    /// Session state.
    pub session: GameSession,
    /// Roster in registration order.
    pub participants: Vec<Participant>,
    /// Derived clock.
    pub clock: ClockState,
    /// Sequence number the snapshot reflects.
    pub head_sequence: u64,
    /// Instant the clock was derived for.
    pub server_time: DateTime<Utc>,
}

impl GameSnapshot {
    /// Captures `projection` with the clock derived at `now`.
    #[must_use]
    pub fn capture(projection: &GameProjection, now: DateTime<Utc>) -> Self {
        Self {
            session: projection.session.clone(),
            participants: projection.participants.clone(),
            clock: derive_clock(&projection.session, now),
            head_sequence: projection.head_sequence,
            server_time: now,
        }
    }
}

/// Lightweight summary of a game for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    /// Game identifier.
    pub game_id: GameId,
    /// Owning tournament/event reference.
    pub event_id: String,
    /// Session status.
    pub status: SessionStatus,
    /// Level in play.
    pub current_level_index: u32,
    /// Participants still playing.
    pub players_remaining: usize,
    /// Roster size.
    pub total_players: usize,
    /// Prize pool in currency units.
    pub prize_pool: i64,
    /// Head of the event log.
    pub head_sequence: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&GameEntry> for GameSummary {
    fn from(entry: &GameEntry) -> Self {
        let projection = &entry.projection;
        Self {
            game_id: projection.session.id,
            event_id: projection.session.event_id.clone(),
            status: projection.session.status,
            current_level_index: projection.session.current_level_index,
            players_remaining: projection.count_with_status(ParticipantStatus::Playing),
            total_players: projection.participants.len(),
            prize_pool: projection.session.prize_pool,
            head_sequence: projection.head_sequence,
            created_at: projection.session.created_at,
        }
    }
}
