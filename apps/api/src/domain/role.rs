use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of roles on the team
///
/// The wire ids (`pm`, `frontend-dev`, ...) are what the model sees in tool
/// schemas and what the event stream carries. Adding or removing a role is a
/// compile-time change: every lookup over roles is an exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    /// Plans the project and coordinates the team
    #[serde(rename = "pm")]
    ProjectManager,
    /// Builds the user interface
    #[serde(rename = "frontend-dev")]
    FrontendDev,
    /// Builds APIs, persistence and server logic
    #[serde(rename = "backend-dev")]
    BackendDev,
    /// Owns the design specification
    #[serde(rename = "designer")]
    Designer,
    /// Reviews and tests the result
    #[serde(rename = "qa-tester")]
    QaTester,
}

impl AgentRole {
    /// Every role, in roster order
    pub const ALL: [AgentRole; 5] = [
        AgentRole::ProjectManager,
        AgentRole::FrontendDev,
        AgentRole::BackendDev,
        AgentRole::Designer,
        AgentRole::QaTester,
    ];

    /// Wire id of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::ProjectManager => "pm",
            AgentRole::FrontendDev => "frontend-dev",
            AgentRole::BackendDev => "backend-dev",
            AgentRole::Designer => "designer",
            AgentRole::QaTester => "qa-tester",
        }
    }

    /// Wire ids of every role, for tool schema enums
    pub fn wire_ids() -> Vec<&'static str> {
        Self::ALL.iter().map(AgentRole::as_str).collect()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown agent role: {}", s))
    }
}
