//! Request bodies for game commands.
//!
//! Every command carries a client-generated `request_id`. Retrying with
//! the same id returns the original outcome instead of running the
//! command twice.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::ParticipantId;

/// Body for commands without parameters: start, pause, resume and
/// advance-level.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CommandRequest {
    /// Idempotency key chosen by the client.
    pub request_id: String,
    /// Who issued the command.
    pub actor_id: String,
}

/// Body for `POST /games/{id}/players`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPlayerRequest {
    /// Idempotency key chosen by the client.
    pub request_id: String,
    /// Who issued the command.
    pub actor_id: String,
    /// External person reference. Unique per game.
    pub person_id: String,
    /// Name shown on the roster.
    pub display_name: String,
}

/// Body for `POST /games/{id}/rebuy`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RebuyRequest {
    /// Idempotency key chosen by the client.
    pub request_id: String,
    /// Who issued the command.
    pub actor_id: String,
    /// Participant buying back in.
    pub participant_id: ParticipantId,
}

/// Body for `POST /games/{id}/eliminate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EliminateRequest {
    /// Idempotency key chosen by the client.
    pub request_id: String,
    /// Who issued the command.
    pub actor_id: String,
    /// Participant knocked out.
    pub participant_id: ParticipantId,
    /// Participant credited with the bounty.
    #[serde(default)]
    pub eliminated_by: Option<ParticipantId>,
}
