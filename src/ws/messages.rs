//! WebSocket message types: server envelope and client commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ClockState, GameSnapshot, TimelineEvent};
use crate::error::GatewayError;

/// Top-level server-to-client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Echo of the client request id for responses; server-generated
    /// otherwise.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for server messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Full game state; the client replaces its state and jumps to its
    /// `head_sequence`.
    Snapshot,
    /// Missed events, oldest first.
    Backfill,
    /// One committed event.
    Event,
    /// Derived clock frame. Not sequenced.
    Clock,
    /// Reply to a client command.
    Response,
    /// Error reply or stream failure.
    Error,
}

impl WsMessage {
    /// Builds a message with a fresh server-side id.
    #[must_use]
    pub fn new(msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self::reply(uuid::Uuid::new_v4().to_string(), msg_type, payload)
    }

    /// Builds a message answering request `id`.
    #[must_use]
    pub fn reply(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wraps a committed event.
    #[must_use]
    pub fn event(event: &TimelineEvent) -> Self {
        Self::new(
            WsMessageType::Event,
            serde_json::to_value(event).unwrap_or_default(),
        )
    }

    /// Wraps a clock frame.
    #[must_use]
    pub fn clock(clock: &ClockState) -> Self {
        Self::new(
            WsMessageType::Clock,
            serde_json::to_value(clock).unwrap_or_default(),
        )
    }

    /// Wraps a full snapshot.
    #[must_use]
    pub fn snapshot(snapshot: &GameSnapshot) -> Self {
        Self::new(
            WsMessageType::Snapshot,
            serde_json::to_value(snapshot).unwrap_or_default(),
        )
    }

    /// Wraps a replay of missed events.
    #[must_use]
    pub fn backfill(events: &[TimelineEvent], head_sequence: u64) -> Self {
        Self::new(
            WsMessageType::Backfill,
            serde_json::json!({
                "events": events,
                "head_sequence": head_sequence,
            }),
        )
    }

    /// Error reply carrying the gateway error code and kind.
    #[must_use]
    pub fn error(id: String, err: &GatewayError) -> Self {
        Self::reply(
            id,
            WsMessageType::Error,
            serde_json::json!({
                "code": err.error_code(),
                "message": err.to_string(),
                "kind": err.kind(),
            }),
        )
    }

    /// Serializes the envelope for a text frame.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// A client-to-server frame.
///
/// ```json
/// { "id": "c-1", "command": "resync", "last_known_sequence": 42 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WsRequest {
    /// Client-chosen id echoed in the reply.
    #[serde(default)]
    pub id: String,
    /// The command itself.
    #[serde(flatten)]
    pub command: WsCommand,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Bring the stream up to date from the client's last applied
    /// sequence, typically after the client detected a gap.
    Resync {
        /// Last sequence the client applied.
        last_known_sequence: u64,
    },
    /// Liveness check; answered with the stream's current position.
    Ping,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::GameId;

    #[test]
    fn resync_request_parses() {
        let Ok(req) = serde_json::from_str::<WsRequest>(
            r#"{"id":"c-1","command":"resync","last_known_sequence":42}"#,
        ) else {
            panic!("parse failed");
        };
        assert_eq!(req.id, "c-1");
        assert_eq!(
            req.command,
            WsCommand::Resync {
                last_known_sequence: 42
            }
        );
    }

    #[test]
    fn ping_without_id_parses() {
        let Ok(req) = serde_json::from_str::<WsRequest>(r#"{"command":"ping"}"#) else {
            panic!("parse failed");
        };
        assert!(req.id.is_empty());
        assert_eq!(req.command, WsCommand::Ping);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<WsRequest>(r#"{"command":"shuffle"}"#).is_err());
    }

    #[test]
    fn error_envelope_carries_kind() {
        let msg = WsMessage::error(
            "c-9".to_string(),
            &GatewayError::GameCompleted(GameId::new()),
        );
        let Some(text) = msg.to_text() else {
            panic!("serialize failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            panic!("bad json");
        };
        assert_eq!(value["type"], "error");
        assert_eq!(value["id"], "c-9");
        assert_eq!(value["payload"]["kind"], "fatal");
        assert_eq!(value["payload"]["code"], 2003);
    }
}
