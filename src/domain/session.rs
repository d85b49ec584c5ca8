//! Game session: clock state and aggregate counters for one game.
//!
//! A [`GameSession`] is a projection. It is only ever mutated by
//! [`super::GameProjection::apply`] as committed events are folded in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BlindLevel, BlindSchedule, GameId, ParticipantId};

/// Lifecycle state of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created, accepting registrations, clock not started.
    Pending,
    /// Clock running.
    Running,
    /// Clock paused; `paused_at` is set.
    Paused,
    /// Winner determined. Terminal.
    Completed,
}

impl SessionStatus {
    /// Lowercase name used in log fields and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// Tournament rules fixed at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameRules {
    /// Last level index at which rebuys are accepted. `None` = no cutoff.
    #[serde(default)]
    pub rebuy_cutoff_level: Option<u32>,
    /// Maximum rebuys per participant. 0 disables rebuys.
    #[serde(default)]
    pub max_rebuys: u32,
    /// Amount added to the prize pool per rebuy.
    #[serde(default)]
    pub rebuy_amount: i64,
    /// Amount added to the prize pool per registration.
    #[serde(default)]
    pub buy_in_amount: i64,
    /// Last level index at which late registration is accepted while the
    /// clock is running. `None` closes registration at `start`.
    #[serde(default)]
    pub late_registration_level: Option<u32>,
}

/// Authoritative clock and counter state for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameSession {
    /// Game identifier.
    pub id: GameId,
    /// External reference to the scheduled event this game belongs to.
    pub event_id: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Immutable level list.
    pub blind_schedule: BlindSchedule,
    /// Index into `blind_schedule` of the level in play.
    pub current_level_index: u32,
    /// When the current level's clock last began running.
    pub level_started_at: Option<DateTime<Utc>>,
    /// Set while paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// Total milliseconds spent paused within the current level.
    pub accumulated_pause_ms: i64,
    /// Buy-ins plus rebuys collected so far.
    pub prize_pool: i64,
    /// Rules fixed at creation.
    pub rules: GameRules,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When `start` was accepted.
    pub started_at: Option<DateTime<Utc>>,
    /// When the winner was determined.
    pub completed_at: Option<DateTime<Utc>>,
    /// Winner once completed.
    pub winner_participant_id: Option<ParticipantId>,
}

impl GameSession {
    /// Creates a fresh `PENDING` session at level 0.
    #[must_use]
    pub fn new(
        id: GameId,
        event_id: String,
        blind_schedule: BlindSchedule,
        rules: GameRules,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            status: SessionStatus::Pending,
            blind_schedule,
            current_level_index: 0,
            level_started_at: None,
            paused_at: None,
            accumulated_pause_ms: 0,
            prize_pool: 0,
            rules,
            created_at,
            started_at: None,
            completed_at: None,
            winner_participant_id: None,
        }
    }

    /// The level currently in play.
    #[must_use]
    pub fn current_level(&self) -> Option<&BlindLevel> {
        self.blind_schedule.level(self.current_level_index)
    }

    /// Returns `true` when no further level exists.
    #[must_use]
    pub fn at_final_level(&self) -> bool {
        self.current_level_index >= self.blind_schedule.last_index()
    }

    /// Returns `true` while the clock is active (running or paused).
    #[must_use]
    pub fn in_play(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    /// Checks the structural invariants: pause timestamp agrees with
    /// status and the level index is in range.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let pause_ok = match self.status {
            SessionStatus::Paused => self.paused_at.is_some(),
            SessionStatus::Running => self.paused_at.is_none(),
            SessionStatus::Pending | SessionStatus::Completed => true,
        };
        pause_ok && self.blind_schedule.contains_index(self.current_level_index)
    }
}
