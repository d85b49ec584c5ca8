//! Game handlers: create, list, snapshot, and event backfill.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateGameRequest, CreateGameResponse, EventsQuery, EventsResponse, GameListParams,
    GameListResponse, paginate,
};
use crate::app_state::AppState;
use crate::domain::{GameId, GameSnapshot};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::NewGame;

/// `POST /games` — Create a new game.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidSchedule`] for a malformed blind
/// schedule or rules.
#[utoipa::path(
    post,
    path = "/api/v1/games",
    tag = "Games",
    summary = "Create a game",
    description = "Creates a game in PENDING status with an immutable blind schedule and rules. The game's log starts with GAME_CREATED at sequence 1.",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = CreateGameResponse),
        (status = 400, description = "Invalid schedule or request", body = ErrorResponse),
    )
)]
pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let created = state
        .game_service
        .create_game(
            NewGame {
                event_id: req.event_id,
                levels: req.blind_schedule,
                rules: req.rules,
            },
            &req.actor_id,
        )
        .await?;

    let response = CreateGameResponse {
        game_id: created.game_id,
        head_sequence: created.sequence_number,
        created_at: created.created_at,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /games` — List games with pagination and optional event filter.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/games",
    tag = "Games",
    summary = "List games",
    description = "Returns a paginated list of games, oldest first, optionally filtered by external event id.",
    params(GameListParams),
    responses(
        (status = 200, description = "Paginated game list", body = GameListResponse),
    )
)]
pub async fn list_games(
    State(state): State<AppState>,
    Query(params): Query<GameListParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let summaries = state
        .game_service
        .list_games(params.event_id.as_deref())
        .await;
    let (data, pagination) = paginate(summaries, params.page, params.per_page);
    Ok(Json(GameListResponse { data, pagination }))
}

/// `GET /games/{id}` — Full game snapshot.
///
/// # Errors
///
/// Returns [`GatewayError::GameNotFound`] if the game does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/games/{id}",
    tag = "Games",
    summary = "Get game snapshot",
    description = "Returns session, roster and derived clock at the current head sequence. Reading the clock commits any level advance that has come due.",
    params(
        ("id" = uuid::Uuid, Path, description = "Game UUID"),
    ),
    responses(
        (status = 200, description = "Game snapshot", body = GameSnapshot),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state
        .game_service
        .snapshot(GameId::from_uuid(id))
        .await?;
    Ok(Json(snapshot))
}

/// `GET /games/{id}/events` — Events after a sequence number.
///
/// # Errors
///
/// Returns [`GatewayError::RetentionExceeded`] (410) when the requested
/// events are outside the retained window.
#[utoipa::path(
    get,
    path = "/api/v1/games/{id}/events",
    tag = "Games",
    summary = "Backfill events",
    description = "Returns events with sequence_number > after, in order. Answers 410 when the gap can no longer be replayed; fetch a snapshot instead.",
    params(
        ("id" = uuid::Uuid, Path, description = "Game UUID"),
        EventsQuery,
    ),
    responses(
        (status = 200, description = "Events after the given sequence", body = EventsResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
        (status = 410, description = "Outside retained window", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let game_id = GameId::from_uuid(id);
    let backfill = state
        .game_service
        .events_after(game_id, query.after)
        .await?;
    Ok(Json(EventsResponse {
        game_id,
        events: backfill.events,
        head_sequence: backfill.head_sequence,
    }))
}

/// Game routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games", post(create_game).get(list_games))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/events", get(list_events))
}
