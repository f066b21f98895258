//! End-to-end API integration tests
//!
//! These tests drive the router with `oneshot` against an in-memory store
//! and a scripted model:
//! - Health check
//! - Project start validation and conflicts
//! - Directive acceptance
//! - State and message queries

mod common;

use agency_api::api::{self, AppState};
use agency_api::domain::project::ProjectBrief;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{setup_team, TestTeam};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for oneshot

fn setup_app(team: &TestTeam) -> Router {
    api::router(AppState::new(team.orchestrator.clone()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let team = setup_team().await;
    let app = setup_app(&team);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_start_project_requires_both_fields() {
    let team = setup_team().await;
    let app = setup_app(&team);

    let response = app
        .oneshot(post_json("/api/project", json!({"projectName": "demo"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "description and projectName required");
}

#[tokio::test]
async fn test_start_project_rejects_path_like_names() {
    let team = setup_team().await;
    let app = setup_app(&team);

    let response = app
        .oneshot(post_json(
            "/api/project",
            json!({"projectName": "a/b", "description": "nested"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_project_conflicts_while_active() {
    let team = setup_team().await;
    // Claim the orchestrator without running the script
    let _run = team
        .orchestrator
        .begin_project(ProjectBrief::new("first", "one"))
        .unwrap();
    let app = setup_app(&team);

    let response = app
        .oneshot(post_json(
            "/api/project",
            json!({"projectName": "second", "description": "two"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_start_project_accepts_valid_brief() {
    let team = setup_team().await;
    let app = setup_app(&team);

    let response = app
        .oneshot(post_json(
            "/api/project",
            json!({"projectName": "demo", "description": "build a todo app"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({"status": "started", "projectName": "demo"}));
}

#[tokio::test]
async fn test_command_requires_text() {
    let team = setup_team().await;

    let empty = setup_app(&team)
        .oneshot(post_json("/api/command", json!({"text": "  "})))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let ok = setup_app(&team)
        .oneshot(post_json("/api/command", json!({"text": "Add dark mode"})))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await, json!({"status": "received"}));
}

#[tokio::test]
async fn test_state_lists_all_agents() {
    let team = setup_team().await;
    let app = setup_app(&team);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["tasks"], json!([]));

    let roles: Vec<&str> = body["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["pm", "frontend-dev", "backend-dev", "designer", "qa-tester"]);
    assert_eq!(body["agents"][0]["name"], "Alex (PM)");
    assert_eq!(body["agents"][0]["status"], "idle");
    assert_eq!(body["agents"][0]["location"], "pm-desk");
}

#[tokio::test]
async fn test_messages_endpoint_returns_recent_messages() {
    let team = setup_team().await;
    use agency_api::domain::message::MessageTarget;
    use agency_api::domain::repositories::TaskStore;
    use agency_api::domain::role::AgentRole;
    team.store
        .save_message(AgentRole::ProjectManager, MessageTarget::All, "hello team")
        .await
        .unwrap();

    let response = setup_app(&team)
        .oneshot(
            Request::builder()
                .uri("/api/messages?limit=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["from"], "pm");
    assert_eq!(body[0]["to"], "all");
    assert_eq!(body[0]["text"], "hello team");
}
