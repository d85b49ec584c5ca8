//! Database row models for the `timeline_events` and `command_outcomes`
//! tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{CommandOutcome, EventPayload, GameCommand, GameId, TimelineEvent};
use crate::error::GatewayError;

/// A stored event row from the `timeline_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Game the event belongs to.
    pub game_id: Uuid,
    /// Per-game sequence number, starting at 1.
    pub sequence_number: i64,
    /// Event type discriminator (e.g. `"GAME_STARTED"`).
    pub event_type: String,
    /// JSONB payload, tagged with the event type.
    pub payload: serde_json::Value,
    /// Who caused the event.
    pub actor_id: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Converts a domain event into its row form.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the payload cannot be encoded
    /// or the sequence number does not fit a `BIGINT`.
    pub fn from_event(event: &TimelineEvent) -> Result<Self, GatewayError> {
        let payload = serde_json::to_value(&event.payload)
            .map_err(|e| GatewayError::Internal(format!("encode event payload: {e}")))?;
        let sequence_number = i64::try_from(event.sequence_number).map_err(|_| {
            GatewayError::Internal(format!("sequence {} overflows BIGINT", event.sequence_number))
        })?;
        Ok(Self {
            id: event.id,
            game_id: *event.game_id.as_uuid(),
            sequence_number,
            event_type: event.event_type_str().to_string(),
            payload,
            actor_id: event.actor_id.clone(),
            created_at: event.created_at,
        })
    }
}

impl TryFrom<StoredEvent> for TimelineEvent {
    type Error = GatewayError;

    fn try_from(row: StoredEvent) -> Result<Self, Self::Error> {
        let payload: EventPayload = serde_json::from_value(row.payload).map_err(|e| {
            GatewayError::PersistenceError(format!("decode event {}: {e}", row.id))
        })?;
        let sequence_number = u64::try_from(row.sequence_number).map_err(|_| {
            GatewayError::PersistenceError(format!(
                "event {} has negative sequence {}",
                row.id, row.sequence_number
            ))
        })?;
        Ok(Self {
            id: row.id,
            game_id: GameId::from_uuid(row.game_id),
            sequence_number,
            payload,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}

/// A stored row from the `command_outcomes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOutcome {
    /// Game the command ran against.
    pub game_id: Uuid,
    /// Client idempotency key.
    pub request_id: String,
    /// The accepted command, tagged by name.
    pub command: serde_json::Value,
    /// The outcome returned to the caller.
    pub outcome: serde_json::Value,
    /// Head sequence right after the commit.
    pub head_sequence: i64,
}

impl StoredOutcome {
    /// Converts an accepted command and its outcome into row form.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if either side cannot be encoded
    /// or the head sequence does not fit a `BIGINT`.
    pub fn from_outcome(command: &GameCommand, outcome: &CommandOutcome) -> Result<Self, GatewayError> {
        let encode = |e: serde_json::Error| GatewayError::Internal(format!("encode outcome: {e}"));
        let head_sequence = i64::try_from(outcome.head_sequence).map_err(|_| {
            GatewayError::Internal(format!("sequence {} overflows BIGINT", outcome.head_sequence))
        })?;
        Ok(Self {
            game_id: *outcome.game_id.as_uuid(),
            request_id: outcome.request_id.clone(),
            command: serde_json::to_value(command).map_err(encode)?,
            outcome: serde_json::to_value(outcome).map_err(encode)?,
            head_sequence,
        })
    }

    /// Decodes the row back into the command and its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the row does not
    /// decode or disagrees with its own key columns.
    pub fn into_parts(self) -> Result<(GameCommand, CommandOutcome), GatewayError> {
        let decode = |e: serde_json::Error| {
            GatewayError::PersistenceError(format!("decode outcome {}: {e}", self.request_id))
        };
        let command: GameCommand = serde_json::from_value(self.command.clone()).map_err(decode)?;
        let outcome: CommandOutcome =
            serde_json::from_value(self.outcome.clone()).map_err(decode)?;
        if *outcome.game_id.as_uuid() != self.game_id || outcome.request_id != self.request_id {
            return Err(GatewayError::PersistenceError(format!(
                "outcome {} does not match its key",
                self.request_id
            )));
        }
        Ok((command, outcome))
    }
}
