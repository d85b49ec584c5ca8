//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::GameService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Game service for all commands, reads and subscriptions.
    pub game_service: Arc<GameService>,
}

impl AppState {
    /// Wraps a service for sharing across handlers.
    #[must_use]
    pub fn new(game_service: Arc<GameService>) -> Self {
        Self { game_service }
    }
}
