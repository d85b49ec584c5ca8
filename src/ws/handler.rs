//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::GameId;
use crate::error::GatewayError;

/// Query string of the upgrade request.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WsParams {
    /// Last sequence the client applied; 0 for a fresh client.
    #[serde(default)]
    pub last_known_sequence: u64,
}

/// `GET /ws/games/{id}` — Upgrade to a game's live stream.
///
/// # Errors
///
/// Returns [`GatewayError::GameNotFound`] (before upgrading) for an
/// unknown game.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<WsParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let game_id = GameId::from_uuid(id);
    state.game_service.registry().get(game_id).await?;
    let service = Arc::clone(&state.game_service);

    Ok(ws.on_upgrade(move |socket| {
        run_connection(socket, service, game_id, params.last_known_sequence)
    }))
}
