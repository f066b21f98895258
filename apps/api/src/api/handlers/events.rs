use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::api::AppState;

/// Live event stream
///
/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls between the two
    let mut events = state.orchestrator.events().subscribe();

    let tasks = match state.orchestrator.tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "Failed to load tasks for init frame");
            Vec::new()
        }
    };
    let init = json!({
        "type": "init",
        "agents": state.orchestrator.agent_infos(),
        "tasks": tasks,
    });
    if sender.send(Message::Text(init.to_string())).await.is_err() {
        return;
    }
    debug!("WebSocket client connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Client frames are ignored; only a close ends the session
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("WebSocket client disconnected");
}
