use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::role::AgentRole;

/// Recipient of a message: one role, or every role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Agent(AgentRole),
    All,
}

impl MessageTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageTarget::Agent(role) => role.as_str(),
            MessageTarget::All => "all",
        }
    }
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MessageTarget::All),
            other => other.parse().map(MessageTarget::Agent),
        }
    }
}

impl From<AgentRole> for MessageTarget {
    fn from(role: AgentRole) -> Self {
        MessageTarget::Agent(role)
    }
}

impl Serialize for MessageTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A message between agents, persisted for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: AgentRole,
    pub to: MessageTarget,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Kind of memory note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Observation,
    Reflection,
    Conversation,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Observation => "observation",
            MemoryKind::Reflection => "reflection",
            MemoryKind::Conversation => "conversation",
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(MemoryKind::Observation),
            "reflection" => Ok(MemoryKind::Reflection),
            "conversation" => Ok(MemoryKind::Conversation),
            other => Err(format!("Unknown memory kind: {}", other)),
        }
    }
}

/// A note an agent keeps about its own work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNote {
    pub id: i64,
    pub agent: AgentRole,
    pub content: String,
    pub importance: i64,
    pub kind: MemoryKind,
    pub timestamp: DateTime<Utc>,
}
