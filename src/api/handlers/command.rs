//! Command handlers: one endpoint per game command.
//!
//! Each handler maps its body onto a [`GameCommand`] and hands it to the
//! service, which serializes it against other commands on the same game.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CommandRequest, EliminateRequest, RebuyRequest, RegisterPlayerRequest};
use crate::app_state::AppState;
use crate::domain::{CommandOutcome, GameCommand, GameId};
use crate::error::{ErrorResponse, GatewayError};

async fn dispatch(
    state: &AppState,
    id: uuid::Uuid,
    request_id: &str,
    actor_id: &str,
    command: GameCommand,
) -> Result<Json<CommandOutcome>, GatewayError> {
    let outcome = state
        .game_service
        .execute(GameId::from_uuid(id), request_id, actor_id, command)
        .await?;
    Ok(Json(outcome))
}

/// `POST /games/{id}/start` — Start the clock.
///
/// # Errors
///
/// Returns a 409 rejection unless the game is pending with at least two
/// registered participants.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/start",
    tag = "Commands",
    summary = "Start the game",
    description = "Moves a PENDING game with at least two registered participants to RUNNING. All registered participants become PLAYING.",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 404, description = "Game not found", body = ErrorResponse),
        (status = 409, description = "Rejected", body = ErrorResponse),
        (status = 410, description = "Game completed", body = ErrorResponse),
    )
)]
pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    dispatch(&state, id, &req.request_id, &req.actor_id, GameCommand::Start).await
}

/// `POST /games/{id}/pause` — Pause the clock.
///
/// # Errors
///
/// Returns a 409 rejection unless the game is running.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/pause",
    tag = "Commands",
    summary = "Pause the clock",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn pause(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    dispatch(&state, id, &req.request_id, &req.actor_id, GameCommand::Pause).await
}

/// `POST /games/{id}/resume` — Resume a paused clock.
///
/// # Errors
///
/// Returns a 409 rejection unless the game is paused.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/resume",
    tag = "Commands",
    summary = "Resume the clock",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    dispatch(&state, id, &req.request_id, &req.actor_id, GameCommand::Resume).await
}

/// `POST /games/{id}/advance-level` — Move to the next level now.
///
/// # Errors
///
/// Returns a 409 rejection at the final level or when the game is not in
/// play.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/advance-level",
    tag = "Commands",
    summary = "Advance to the next blind level",
    description = "Starts the next level immediately with its full duration. A paused game stays paused.",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn advance_level(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    dispatch(
        &state,
        id,
        &req.request_id,
        &req.actor_id,
        GameCommand::AdvanceLevel,
    )
    .await
}

/// `POST /games/{id}/players` — Register a participant.
///
/// # Errors
///
/// Returns a 409 rejection for a duplicate person or when registration
/// is closed.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/players",
    tag = "Commands",
    summary = "Register a participant",
    description = "Adds a person to the roster. Before start the participant is REGISTERED; a late registration enters as PLAYING.",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = RegisterPlayerRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn register_player(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<RegisterPlayerRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let command = GameCommand::RegisterPlayer {
        person_id: req.person_id,
        display_name: req.display_name,
    };
    dispatch(&state, id, &req.request_id, &req.actor_id, command).await
}

/// `POST /games/{id}/rebuy` — Rebuy for a playing participant.
///
/// # Errors
///
/// Returns a 409 rejection after the cutoff level or past the rebuy
/// limit.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/rebuy",
    tag = "Commands",
    summary = "Rebuy",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = RebuyRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 404, description = "Participant not found", body = ErrorResponse),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn rebuy(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<RebuyRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let command = GameCommand::Rebuy {
        participant_id: req.participant_id,
    };
    dispatch(&state, id, &req.request_id, &req.actor_id, command).await
}

/// `POST /games/{id}/eliminate` — Knock out a participant.
///
/// # Errors
///
/// Returns a 409 rejection unless the participant (and eliminator, if
/// given) is playing.
#[utoipa::path(
    post,
    path = "/api/v1/games/{id}/eliminate",
    tag = "Commands",
    summary = "Eliminate a participant",
    description = "Records a knockout with finish position equal to the number of players left. Eliminating the second-to-last player also ends the game.",
    params(("id" = uuid::Uuid, Path, description = "Game UUID")),
    request_body = EliminateRequest,
    responses(
        (status = 200, description = "Committed events", body = CommandOutcome),
        (status = 404, description = "Participant not found", body = ErrorResponse),
        (status = 409, description = "Rejected", body = ErrorResponse),
    )
)]
pub async fn eliminate(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<EliminateRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let command = GameCommand::Eliminate {
        participant_id: req.participant_id,
        eliminated_by: req.eliminated_by,
    };
    dispatch(&state, id, &req.request_id, &req.actor_id, command).await
}

/// Command routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games/{id}/start", post(start))
        .route("/games/{id}/pause", post(pause))
        .route("/games/{id}/resume", post(resume))
        .route("/games/{id}/advance-level", post(advance_level))
        .route("/games/{id}/players", post(register_player))
        .route("/games/{id}/rebuy", post(rebuy))
        .route("/games/{id}/eliminate", post(eliminate))
}
