//! REST API layer: route handlers, DTOs, OpenAPI document, and router
//! composition.
//!
//! All game endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "tourney-gateway",
        description = "Live poker tournament clock and game-state engine"
    ),
    paths(
        handlers::system::health_handler,
        handlers::game::create_game,
        handlers::game::list_games,
        handlers::game::get_game,
        handlers::game::list_events,
        handlers::command::start,
        handlers::command::pause,
        handlers::command::resume,
        handlers::command::advance_level,
        handlers::command::register_player,
        handlers::command::rebuy,
        handlers::command::eliminate,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::error::ErrorKind,
        crate::domain::GameSnapshot,
        crate::domain::GameSummary,
        crate::domain::CommandOutcome,
        crate::domain::TimelineEvent,
        crate::domain::EventPayload,
        crate::domain::ClockState,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Games", description = "Game lifecycle and state"),
        (name = "Commands", description = "Idempotent game commands"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, OpenAPI, and HTTP
/// middleware, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws/games/{id}", get(ws_handler))
        .merge(docs_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}
