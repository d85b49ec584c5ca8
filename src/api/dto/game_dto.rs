//! Game DTOs for create, list, snapshot and backfill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, default_page, default_per_page};
use crate::domain::{BlindLevel, GameId, GameRules, GameSummary, TimelineEvent};

/// Request body for `POST /games`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGameRequest {
    /// Owning tournament/event reference.
    pub event_id: String,
    /// Ordered blind levels, indexed from 0.
    pub blind_schedule: Vec<BlindLevel>,
    /// Buy-in, rebuy and registration rules.
    #[serde(default)]
    pub rules: GameRules,
    /// Who is creating the game.
    pub actor_id: String,
}

/// Response body for `POST /games` (201 Created).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateGameResponse {
    /// Unique game identifier.
    pub game_id: GameId,
    /// Always 1: the `GAME_CREATED` event.
    pub head_sequence: u64,
    /// Server creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query parameters for `GET /games`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct GameListParams {
    /// Only games of this event.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Paginated list response for `GET /games`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameListResponse {
    /// Game summaries, oldest first.
    pub data: Vec<GameSummary>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Query parameters for `GET /games/{id}/events`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Return events with a sequence number greater than this.
    #[serde(default)]
    pub after: u64,
}

/// Response body for `GET /games/{id}/events`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventsResponse {
    /// Game the events belong to.
    pub game_id: GameId,
    /// Events in sequence order.
    pub events: Vec<TimelineEvent>,
    /// Head sequence at read time.
    pub head_sequence: u64,
}
