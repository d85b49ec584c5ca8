//! Participant roster entries.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GameId, ParticipantId};

/// Lifecycle state of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    /// Registered before the game started.
    Registered,
    /// In the game and holding chips.
    Playing,
    /// Knocked out. Terminal.
    Eliminated,
    /// Last participant standing. Terminal.
    Winner,
}

/// One person's entry in one game.
///
/// Participants are never removed; after the game completes they are the
/// permanent record of its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Owning game.
    pub game_id: GameId,
    /// External person reference. Unique within a game.
    pub person_id: String,
    /// Name shown on player screens and the dealer display.
    pub display_name: String,
    /// Lifecycle state.
    pub status: ParticipantStatus,
    /// Rebuys purchased.
    pub rebuy_count: u32,
    /// Eliminations credited to this participant.
    pub bounties_won: u32,
    /// Times this participant was eliminated by another participant.
    pub bounties_lost: u32,
    /// Final rank; `None` while still registered or playing.
    pub finish_position: Option<u32>,
    /// Who knocked this participant out, if recorded.
    pub eliminated_by_participant_id: Option<ParticipantId>,
    /// Sequence number of the `PLAYER_ELIMINATED` event.
    pub eliminated_at_sequence: Option<u64>,
}

impl Participant {
    /// Creates a roster entry with zeroed counters.
    #[must_use]
    pub fn new(
        id: ParticipantId,
        game_id: GameId,
        person_id: String,
        display_name: String,
        status: ParticipantStatus,
    ) -> Self {
        Self {
            id,
            game_id,
            person_id,
            display_name,
            status,
            rebuy_count: 0,
            bounties_won: 0,
            bounties_lost: 0,
            finish_position: None,
            eliminated_by_participant_id: None,
            eliminated_at_sequence: None,
        }
    }

    /// Returns `true` while the participant holds chips.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.status == ParticipantStatus::Playing
    }
}
