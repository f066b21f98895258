// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::agents::orchestrator::Orchestrator;
use handlers::{events, project, state};

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// All routes, without transport middleware
pub fn router(app_state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(state::health_check))
        // Project lifecycle
        .route("/api/project", post(project::start_project))
        .route("/api/command", post(project::send_command))
        // Queries
        .route("/api/state", get(state::get_state))
        .route("/api/messages", get(state::get_messages))
        // Live events
        .route("/ws", get(events::ws_handler))
        .with_state(app_state)
}
