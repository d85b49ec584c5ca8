//! Commands and their validation rules.
//!
//! [`decide`] is a pure function: given the current projection, a
//! command, and "now", it either rejects the command or returns the event
//! payloads to append. Nothing is mutated here; the service commits the
//! payloads and folds them into the projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventPayload, GameProjection, ParticipantId, ParticipantStatus, SessionStatus};
use crate::error::GatewayError;

/// An intended change to one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GameCommand {
    /// Start the clock.
    Start,
    /// Pause the clock.
    Pause,
    /// Resume a paused clock.
    Resume,
    /// Move to the next blind level now.
    AdvanceLevel,
    /// Add a person to the roster.
    RegisterPlayer {
        /// External person reference.
        person_id: String,
        /// Display name.
        display_name: String,
    },
    /// Buy a playing participant back in.
    Rebuy {
        /// Participant rebuying.
        participant_id: ParticipantId,
    },
    /// Knock out a playing participant.
    Eliminate {
        /// Participant eliminated.
        participant_id: ParticipantId,
        /// Participant credited with the bounty.
        #[serde(default)]
        eliminated_by: Option<ParticipantId>,
    },
}

impl GameCommand {
    /// Short name used in logs and rejection messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::AdvanceLevel => "advance_level",
            Self::RegisterPlayer { .. } => "register_player",
            Self::Rebuy { .. } => "rebuy",
            Self::Eliminate { .. } => "eliminate",
        }
    }
}

/// Validates `command` against `projection` at `now`.
///
/// Callers must have already appended any implicit level advances due
/// at `now`, so the level seen here is the real current level.
///
/// # Errors
///
/// Returns [`GatewayError::GameCompleted`] for any command on a completed
/// game, and a rule-specific rejection when a precondition fails. A
/// rejection never has side effects.
pub fn decide(
    projection: &GameProjection,
    command: &GameCommand,
    now: DateTime<Utc>,
) -> Result<Vec<EventPayload>, GatewayError> {
    let session = &projection.session;
    if session.status == SessionStatus::Completed {
        return Err(GatewayError::GameCompleted(session.id));
    }

    match command {
        GameCommand::Start => {
            if session.status != SessionStatus::Pending {
                return Err(GatewayError::GameAlreadyStarted);
            }
            let registered = projection.count_with_status(ParticipantStatus::Registered);
            if registered < 2 {
                return Err(GatewayError::NotEnoughPlayers { registered });
            }
            Ok(vec![EventPayload::GameStarted { started_at: now }])
        }

        GameCommand::Pause => {
            if session.status != SessionStatus::Running {
                return Err(invalid_state(command, session.status));
            }
            Ok(vec![EventPayload::TimerPaused { paused_at: now }])
        }

        GameCommand::Resume => {
            let (SessionStatus::Paused, Some(paused_at)) = (session.status, session.paused_at)
            else {
                return Err(invalid_state(command, session.status));
            };
            let paused_ms = (now - paused_at).num_milliseconds().max(0);
            Ok(vec![EventPayload::TimerResumed {
                resumed_at: now,
                paused_ms,
            }])
        }

        GameCommand::AdvanceLevel => {
            if !session.in_play() {
                return Err(invalid_state(command, session.status));
            }
            if session.at_final_level() {
                return Err(GatewayError::FinalLevelReached(session.current_level_index));
            }
            Ok(vec![EventPayload::BlindLevelUp {
                from_level: session.current_level_index,
                to_level: session.current_level_index.saturating_add(1),
                level_started_at: now,
                automatic: false,
            }])
        }

        GameCommand::RegisterPlayer {
            person_id,
            display_name,
        } => {
            if person_id.trim().is_empty() || display_name.trim().is_empty() {
                return Err(GatewayError::InvalidRequest(
                    "person_id and display_name must not be empty".to_string(),
                ));
            }
            if projection.participant_by_person(person_id).is_some() {
                return Err(GatewayError::AlreadyRegistered(person_id.clone()));
            }
            let initial_status = match session.status {
                SessionStatus::Pending => ParticipantStatus::Registered,
                SessionStatus::Running | SessionStatus::Paused => {
                    let Some(last_level) = session.rules.late_registration_level else {
                        return Err(GatewayError::RegistrationClosed(
                            "late registration is not allowed".to_string(),
                        ));
                    };
                    if session.current_level_index > last_level {
                        return Err(GatewayError::RegistrationClosed(format!(
                            "late registration closed after level {last_level}"
                        )));
                    }
                    if projection.has_eliminations() {
                        return Err(GatewayError::RegistrationClosed(
                            "late registration closed after the first elimination".to_string(),
                        ));
                    }
                    ParticipantStatus::Playing
                }
                SessionStatus::Completed => return Err(GatewayError::GameCompleted(session.id)),
            };
            Ok(vec![EventPayload::PlayerRegistered {
                participant_id: ParticipantId::new(),
                person_id: person_id.clone(),
                display_name: display_name.clone(),
                initial_status,
            }])
        }

        GameCommand::Rebuy { participant_id } => {
            let participant = projection
                .participant(*participant_id)
                .ok_or(GatewayError::ParticipantNotFound(*participant_id.as_uuid()))?;
            if !participant.is_playing() {
                return Err(GatewayError::ParticipantNotPlaying(*participant_id.as_uuid()));
            }
            if participant.rebuy_count >= session.rules.max_rebuys {
                return Err(GatewayError::RebuyLimitReached {
                    max_rebuys: session.rules.max_rebuys,
                });
            }
            if let Some(cutoff) = session.rules.rebuy_cutoff_level
                && session.current_level_index > cutoff
            {
                return Err(GatewayError::RebuyCutoffPassed {
                    cutoff_level: cutoff,
                    current_level: session.current_level_index,
                });
            }
            Ok(vec![EventPayload::PlayerRebuy {
                participant_id: *participant_id,
                amount: session.rules.rebuy_amount,
            }])
        }

        GameCommand::Eliminate {
            participant_id,
            eliminated_by,
        } => {
            let participant = projection
                .participant(*participant_id)
                .ok_or(GatewayError::ParticipantNotFound(*participant_id.as_uuid()))?;
            if !participant.is_playing() {
                return Err(GatewayError::ParticipantNotPlaying(*participant_id.as_uuid()));
            }
            if let Some(hunter_id) = eliminated_by {
                if hunter_id == participant_id {
                    return Err(GatewayError::InvalidRequest(
                        "a participant cannot eliminate themselves".to_string(),
                    ));
                }
                let hunter = projection
                    .participant(*hunter_id)
                    .ok_or(GatewayError::ParticipantNotFound(*hunter_id.as_uuid()))?;
                if !hunter.is_playing() {
                    return Err(GatewayError::ParticipantNotPlaying(*hunter_id.as_uuid()));
                }
            }

            let playing = projection.count_with_status(ParticipantStatus::Playing);
            let finish_position = u32::try_from(playing).unwrap_or(u32::MAX);
            let mut payloads = vec![EventPayload::PlayerEliminated {
                participant_id: *participant_id,
                finish_position,
                eliminated_by: *eliminated_by,
            }];

            if playing == 2 {
                let survivor = projection
                    .participants
                    .iter()
                    .find(|p| p.is_playing() && p.id != *participant_id)
                    .ok_or_else(|| {
                        GatewayError::Internal("survivor missing from roster".to_string())
                    })?;
                payloads.push(EventPayload::GameEnded {
                    winner_participant_id: survivor.id,
                    ended_at: now,
                });
            }
            Ok(payloads)
        }
    }
}

fn invalid_state(command: &GameCommand, status: SessionStatus) -> GatewayError {
    GatewayError::InvalidState {
        command: command.name(),
        status: status.as_str(),
    }
}
