use serde::{Deserialize, Serialize};

pub use crate::domain::role::AgentRole;

/// What an agent is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Thinking,
    Working,
    Talking,
    Reviewing,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Thinking => write!(f, "thinking"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Talking => write!(f, "talking"),
            AgentStatus::Reviewing => write!(f, "reviewing"),
        }
    }
}

/// Status shown while a role executes tools
pub fn busy_status(role: AgentRole) -> AgentStatus {
    match role {
        AgentRole::QaTester => AgentStatus::Reviewing,
        AgentRole::ProjectManager
        | AgentRole::FrontendDev
        | AgentRole::BackendDev
        | AgentRole::Designer => AgentStatus::Working,
    }
}

/// Snapshot of one agent for the state query and the `init` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub role: AgentRole,
    pub name: String,
    pub status: AgentStatus,
    /// Title of the task currently assigned, if any
    pub current_task: Option<String>,
    pub location: String,
}
