//! Shared fixtures for integration tests

#![allow(dead_code)]

use agency_api::agents::errors::{AgentError, AgentResult};
use agency_api::agents::events::{AgentEvent, EventSink};
use agency_api::agents::llm::{LanguageModel, ModelRequest, ModelResponse};
use agency_api::agents::orchestrator::{Orchestrator, OrchestratorConfig};
use agency_api::domain::role::AgentRole;
use agency_api::infrastructure::repositories::SqliteTaskStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Language model that replays canned responses per role
///
/// A role with an empty script answers "Done." without calling tools.
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<AgentRole, VecDeque<ModelResponse>>>,
    failing: Mutex<HashSet<AgentRole>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, role: AgentRole, responses: Vec<ModelResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .extend(responses);
    }

    /// Every call made on behalf of `role` fails
    pub fn fail(&self, role: AgentRole) {
        self.failing.lock().unwrap().insert(role);
    }

    pub fn requests_for(&self, role: AgentRole) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent == role)
            .cloned()
            .collect()
    }

    /// Calls for `role` whose newest turn mentions `needle`
    pub fn instructions_containing(&self, role: AgentRole, needle: &str) -> usize {
        self.requests_for(role)
            .iter()
            .filter(|r| r.messages.last().is_some_and(|t| t.text().contains(needle)))
            .count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> AgentResult<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.lock().unwrap().contains(&request.agent) {
            return Err(AgentError::LlmError(format!("scripted failure for {}", request.agent)));
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.agent)
            .and_then(|script| script.pop_front());
        Ok(next.unwrap_or_else(|| ModelResponse::text("Done.")))
    }
}

pub struct TestTeam {
    pub orchestrator: Arc<Orchestrator>,
    pub model: Arc<ScriptedModel>,
    pub store: Arc<SqliteTaskStore>,
    pub events: EventSink,
    pub output: TempDir,
}

pub async fn setup_team() -> TestTeam {
    let output = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new();
    let store = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
    let events = EventSink::default();

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorConfig::new(output.path()),
        store.clone(),
        model.clone(),
        events.clone(),
    ));

    TestTeam {
        orchestrator,
        model,
        store,
        events,
        output,
    }
}

/// Everything currently buffered on the receiver
pub fn drain(rx: &mut broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
