//! Domain events: the append-only timeline of a game.
//!
//! Every committed state change is a [`TimelineEvent`]. Events are
//! broadcast to WebSocket subscribers, retained in memory for backfill,
//! and optionally persisted to the PostgreSQL event log. Session and
//! participant state are a fold over these events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BlindSchedule, GameId, GameRules, ParticipantId, ParticipantStatus};

/// Actor recorded on events the engine emits on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// Event-specific data. The `type` tag doubles as the event type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    /// First event of every game.
    GameCreated {
        /// External scheduled-event reference.
        event_id: String,
        /// Immutable level list.
        blind_schedule: BlindSchedule,
        /// Rebuy and registration rules.
        rules: GameRules,
    },

    /// A person joined the roster.
    PlayerRegistered {
        /// Newly assigned participant id.
        participant_id: ParticipantId,
        /// External person reference.
        person_id: String,
        /// Display name.
        display_name: String,
        /// `REGISTERED` before start, `PLAYING` for late registration.
        initial_status: ParticipantStatus,
    },

    /// The clock started; every registered participant is now playing.
    GameStarted {
        /// Start instant; also the start of level 0.
        started_at: DateTime<Utc>,
    },

    /// The clock was paused.
    TimerPaused {
        /// Pause instant.
        paused_at: DateTime<Utc>,
    },

    /// The clock resumed.
    TimerResumed {
        /// Resume instant.
        resumed_at: DateTime<Utc>,
        /// Length of the pause that just ended, in milliseconds.
        paused_ms: i64,
    },

    /// Moved to the next blind level.
    BlindLevelUp {
        /// Level being left.
        from_level: u32,
        /// Level entered.
        to_level: u32,
        /// When the new level's clock begins.
        level_started_at: DateTime<Utc>,
        /// `true` when the level expired on its own.
        automatic: bool,
    },

    /// A playing participant bought back in.
    PlayerRebuy {
        /// Participant rebuying.
        participant_id: ParticipantId,
        /// Amount added to the prize pool.
        amount: i64,
    },

    /// A playing participant was knocked out.
    PlayerEliminated {
        /// Participant eliminated.
        participant_id: ParticipantId,
        /// Assigned final rank.
        finish_position: u32,
        /// Participant credited with the bounty, if any.
        eliminated_by: Option<ParticipantId>,
    },

    /// One participant remains; the game is over.
    GameEnded {
        /// Participant promoted to winner.
        winner_participant_id: ParticipantId,
        /// Completion instant.
        ended_at: DateTime<Utc>,
    },
}

impl EventPayload {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "GAME_CREATED",
            Self::PlayerRegistered { .. } => "PLAYER_REGISTERED",
            Self::GameStarted { .. } => "GAME_STARTED",
            Self::TimerPaused { .. } => "TIMER_PAUSED",
            Self::TimerResumed { .. } => "TIMER_RESUMED",
            Self::BlindLevelUp { .. } => "BLIND_LEVEL_UP",
            Self::PlayerRebuy { .. } => "PLAYER_REBUY",
            Self::PlayerEliminated { .. } => "PLAYER_ELIMINATED",
            Self::GameEnded { .. } => "GAME_ENDED",
        }
    }
}

/// A committed, sequence-numbered entry in a game's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimelineEvent {
    /// Unique event identifier.
    pub id: uuid::Uuid,
    /// Game the event belongs to.
    pub game_id: GameId,
    /// Position in the game's log, starting at 1 with no gaps.
    pub sequence_number: u64,
    /// Event-specific data.
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Who caused the event (admin id, or [`SYSTEM_ACTOR`]).
    pub actor_id: String,
    /// Server commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
    /// Builds an event with a fresh id.
    #[must_use]
    pub fn new(
        game_id: GameId,
        sequence_number: u64,
        payload: EventPayload,
        actor_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            game_id,
            sequence_number,
            payload,
            actor_id,
            created_at,
        }
    }

    /// Shorthand for `self.payload.event_type_str()`.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        self.payload.event_type_str()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_serde_tag() {
        let payload = EventPayload::TimerPaused {
            paused_at: Utc::now(),
        };
        let Ok(value) = serde_json::to_value(&payload) else {
            panic!("serialization failed");
        };
        assert_eq!(
            value.get("type").and_then(|v| v.as_str()),
            Some(payload.event_type_str())
        );
    }

    #[test]
    fn timeline_event_flattens_payload() {
        let event = TimelineEvent::new(
            GameId::new(),
            7,
            EventPayload::PlayerEliminated {
                participant_id: ParticipantId::new(),
                finish_position: 3,
                eliminated_by: None,
            },
            "admin-1".to_string(),
            Utc::now(),
        );
        let Ok(json) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"type\":\"PLAYER_ELIMINATED\""));
        assert!(json.contains("\"sequence_number\":7"));

        let Ok(back) = serde_json::from_str::<TimelineEvent>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, event);
    }
}
