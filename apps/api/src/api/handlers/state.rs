use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::agents::state::ProjectPhase;
use crate::agents::types::AgentInfo;
use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::message::Message;
use crate::domain::task::Task;

const DEFAULT_MESSAGE_LIMIT: u32 = 50;
const MAX_MESSAGE_LIMIT: u32 = 500;

/// Snapshot of the whole team
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub phase: ProjectPhase,
    pub agents: Vec<AgentInfo>,
    pub tasks: Vec<Task>,
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/state
pub async fn get_state(State(state): State<AppState>) -> Result<Json<StateResponse>, ApiError> {
    let orchestrator = &state.orchestrator;
    Ok(Json(StateResponse {
        phase: orchestrator.phase(),
        agents: orchestrator.agent_infos(),
        tasks: orchestrator.tasks().await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
}

/// Most recent messages first
///
/// GET /api/messages?limit=
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .min(MAX_MESSAGE_LIMIT);
    Ok(Json(state.orchestrator.recent_messages(limit).await?))
}
