// Event stream broadcast to every subscriber (UI, logs, tests)
//
// Events are observations: emitted once, never mutated.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::AgentStatus;
use crate::domain::message::MessageTarget;
use crate::domain::role::AgentRole;
use crate::domain::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    AgentStatus {
        agent: AgentRole,
        status: AgentStatus,
        task: Option<String>,
    },
    AgentThinking {
        agent: AgentRole,
        thought: String,
    },
    AgentMove {
        agent: AgentRole,
        destination: String,
    },
    FileWrite {
        agent: AgentRole,
        path: String,
        content: String,
    },
    FileRead {
        agent: AgentRole,
        path: String,
    },
    Message {
        from: AgentRole,
        to: MessageTarget,
        text: String,
    },
    TaskUpdate {
        task: Task,
    },
    CommandRun {
        agent: AgentRole,
        command: String,
        output: String,
    },
    ProjectComplete {
        project_name: String,
        output_path: String,
    },
    Error {
        agent: Option<AgentRole>,
        message: String,
    },
    BossCommand {
        text: String,
    },
}

impl AgentEvent {
    /// The agent this event is about, if any
    pub fn agent(&self) -> Option<AgentRole> {
        match self {
            AgentEvent::AgentStatus { agent, .. }
            | AgentEvent::AgentThinking { agent, .. }
            | AgentEvent::AgentMove { agent, .. }
            | AgentEvent::FileWrite { agent, .. }
            | AgentEvent::FileRead { agent, .. }
            | AgentEvent::CommandRun { agent, .. } => Some(*agent),
            AgentEvent::Message { from, .. } => Some(*from),
            AgentEvent::Error { agent, .. } => *agent,
            AgentEvent::TaskUpdate { .. }
            | AgentEvent::ProjectComplete { .. }
            | AgentEvent::BossCommand { .. } => None,
        }
    }
}

/// Fan-out of events to every live subscriber, in emission order
///
/// Cloning is cheap; every clone feeds the same channel. Emitting with no
/// subscriber attached is not an error.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: AgentEvent) {
        tracing::trace!(?event, "emit");
        // Ignored if no receivers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}
