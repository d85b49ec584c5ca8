//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response,
//! and to one [`ErrorKind`] of the engine's error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::GameId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4003,
///     "message": "rebuy cutoff passed: level 3 is after cutoff level 2",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Error taxonomy class.
    pub kind: ErrorKind,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A precondition failed. State unchanged; do not retry automatically.
    Validation,
    /// Requested history is outside the retained window; resync from a
    /// snapshot.
    StreamGap,
    /// Unknown game, or a command against a completed game. Do not retry.
    Fatal,
    /// Infrastructure failure on the server side.
    Server,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                |
/// |-----------|-------------------|----------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request            |
/// | 2000–2999 | Not Found / Gone  | 404 Not Found / 410 Gone   |
/// | 3000–3999 | Server            | 500 Internal Server Error  |
/// | 4000–4999 | Rule Rejection    | 409 Conflict               |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Game with the given ID was not found.
    #[error("game not found: {0}")]
    GameNotFound(uuid::Uuid),

    /// Participant with the given ID is not on the roster.
    #[error("participant not found: {0}")]
    ParticipantNotFound(uuid::Uuid),

    /// The game is completed and accepts no further commands.
    #[error("game {0} is completed")]
    GameCompleted(GameId),

    /// Requested backfill starts before the retained log window.
    #[error("events after sequence {requested} are no longer retained (oldest is {oldest_retained})")]
    RetentionExceeded {
        /// Sequence the client asked to resume after.
        requested: u64,
        /// Oldest sequence still held in memory.
        oldest_retained: u64,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Blind schedule or rules are malformed.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// An idempotency key was reused for a different command.
    #[error("idempotency key {0} was already used for a different command")]
    IdempotencyKeyReused(String),

    /// Command not valid in the current session status.
    #[error("cannot {command} while game is {status}")]
    InvalidState {
        /// Command attempted.
        command: &'static str,
        /// Current session status.
        status: &'static str,
    },

    /// `start` on a game that already started.
    #[error("game already started")]
    GameAlreadyStarted,

    /// `start` with fewer than two registered participants.
    #[error("at least 2 registered participants required, found {registered}")]
    NotEnoughPlayers {
        /// Participants currently registered.
        registered: usize,
    },

    /// `advance_level` at the last level.
    #[error("already at final level {0}")]
    FinalLevelReached(u32),

    /// The person is already on this game's roster.
    #[error("person {0} is already registered")]
    AlreadyRegistered(String),

    /// Registration is no longer accepted.
    #[error("registration closed: {0}")]
    RegistrationClosed(String),

    /// Participant is not currently playing.
    #[error("participant {0} is not playing")]
    ParticipantNotPlaying(uuid::Uuid),

    /// Rebuy attempted after the cutoff level.
    #[error("rebuy cutoff passed: level {current_level} is after cutoff level {cutoff_level}")]
    RebuyCutoffPassed {
        /// Last level that accepts rebuys.
        cutoff_level: u32,
        /// Level in play.
        current_level: u32,
    },

    /// Participant already used every allowed rebuy.
    #[error("rebuy limit of {max_rebuys} reached")]
    RebuyLimitReached {
        /// Configured maximum.
        max_rebuys: u32,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidSchedule(_) => 1002,
            Self::IdempotencyKeyReused(_) => 1003,
            Self::GameNotFound(_) => 2001,
            Self::ParticipantNotFound(_) => 2002,
            Self::GameCompleted(_) => 2003,
            Self::RetentionExceeded { .. } => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::InvalidState { .. } => 4001,
            Self::GameAlreadyStarted => 4002,
            Self::RebuyCutoffPassed { .. } => 4003,
            Self::RebuyLimitReached { .. } => 4004,
            Self::ParticipantNotPlaying(_) => 4005,
            Self::FinalLevelReached(_) => 4006,
            Self::NotEnoughPlayers { .. } => 4007,
            Self::AlreadyRegistered(_) => 4008,
            Self::RegistrationClosed(_) => 4009,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidSchedule(_) | Self::IdempotencyKeyReused(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::GameNotFound(_) | Self::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
            Self::GameCompleted(_) | Self::RetentionExceeded { .. } => StatusCode::GONE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidState { .. }
            | Self::GameAlreadyStarted
            | Self::NotEnoughPlayers { .. }
            | Self::FinalLevelReached(_)
            | Self::AlreadyRegistered(_)
            | Self::RegistrationClosed(_)
            | Self::ParticipantNotPlaying(_)
            | Self::RebuyCutoffPassed { .. }
            | Self::RebuyLimitReached { .. } => StatusCode::CONFLICT,
        }
    }

    /// Classifies the error for callers deciding whether to retry.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::GameNotFound(_) | Self::GameCompleted(_) => ErrorKind::Fatal,
            Self::RetentionExceeded { .. } => ErrorKind::StreamGap,
            Self::PersistenceError(_) | Self::Internal(_) => ErrorKind::Server,
            _ => ErrorKind::Validation,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                kind: self.kind(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
