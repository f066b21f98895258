use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a persisted project record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Complete,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Complete => "complete",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "complete" => Ok(ProjectStatus::Complete),
            "failed" => Ok(ProjectStatus::Failed),
            other => Err(format!("Unknown project status: {}", other)),
        }
    }
}

/// What the operator asks for when starting a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBrief {
    pub project_name: String,
    pub description: String,
}

impl ProjectBrief {
    pub fn new(project_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            description: description.into(),
        }
    }

    /// Checks the brief before any work starts
    ///
    /// The project name becomes a directory under the output root, so it must
    /// be a single, non-empty path segment.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.project_name.trim();
        if name.is_empty() {
            return Err("projectName cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description cannot be empty".to_string());
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(format!("Invalid project name: {}", self.project_name));
        }
        Ok(())
    }
}

/// A project record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub brief: String,
    /// Sandbox root for every file tool
    pub output_path: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(brief: &ProjectBrief, output_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: brief.project_name.clone(),
            brief: brief.description.clone(),
            output_path: output_path.into(),
            status: ProjectStatus::Active,
            created_at: Utc::now(),
        }
    }
}
