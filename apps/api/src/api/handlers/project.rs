use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agents::events::AgentEvent;
use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::project::ProjectBrief;

/// Request body for starting a project
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProjectRequest {
    pub project_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProjectResponse {
    pub status: &'static str,
    pub project_name: String,
}

/// Start a project; the script runs in the background
///
/// POST /api/project
pub async fn start_project(
    State(state): State<AppState>,
    Json(req): Json<StartProjectRequest>,
) -> Result<Json<StartProjectResponse>, ApiError> {
    let (Some(project_name), Some(description)) = (req.project_name, req.description) else {
        return Err(ApiError::bad_request("description and projectName required"));
    };

    let run = state
        .orchestrator
        .begin_project(ProjectBrief::new(project_name, description))?;
    let project_name = run.project_name().to_string();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.run_project(run).await {
            Ok(output) => info!(output = %output.display(), "Project run finished"),
            Err(e) => error!(error = %e, "Project run failed"),
        }
    });

    Ok(Json(StartProjectResponse {
        status: "started",
        project_name,
    }))
}

/// Request body for a boss directive
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
}

/// Route a directive to the PM; the reply arrives on the event stream as a
/// `message` from the PM
///
/// POST /api/command
pub async fn send_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let text = req
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("text required"))?;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.send_directive(&text).await {
            error!(error = %e, "Directive failed");
            orchestrator.events().emit(AgentEvent::Error {
                agent: None,
                message: e.to_string(),
            });
        }
    });

    Ok(Json(CommandResponse { status: "received" }))
}
