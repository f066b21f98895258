use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::TaskStatus;
use crate::domain::role::AgentRole;

/// A task on the shared board
///
/// Ids are caller-assigned (the planning agent picks `task-1`, `task-2`, ...)
/// and stable for the lifetime of a project. `dependencies` and `files` are
/// advisory; nothing in the store enforces them.
///
/// # Example
/// ```
/// use agency_api::domain::task::{Task, TaskPatch, TaskStatus};
///
/// let task = Task::create("task-1", TaskStatus::Pending, &TaskPatch::default(), None);
/// assert_eq!(task.title, "task-1");
/// assert_eq!(task.description, "");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub assignee: Option<AgentRole>,
    pub status: TaskStatus,
    /// Higher sorts first
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dependencies: Vec<String>,
    pub files: Vec<String>,
}

/// Fields supplied by one `update_task` call
///
/// Only the fields that are `Some` are merged into an existing task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<AgentRole>,
    pub priority: Option<i64>,
    pub files: Option<Vec<String>>,
}

impl Task {
    /// Builds the record for a task id seen for the first time
    ///
    /// Title defaults to the id, description to empty, priority to 0. The
    /// patch's assignee wins over `default_assignee`.
    pub fn create(
        id: &str,
        status: TaskStatus,
        patch: &TaskPatch,
        default_assignee: Option<AgentRole>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            title: patch.title.clone().unwrap_or_else(|| id.to_string()),
            description: patch.description.clone().unwrap_or_default(),
            assignee: patch.assignee.or(default_assignee),
            status,
            priority: patch.priority.unwrap_or(0),
            created_at: now,
            updated_at: now,
            dependencies: Vec::new(),
            files: patch.files.clone().unwrap_or_default(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == TaskStatus::Blocked
    }
}

impl TaskPatch {
    /// A patch that only moves the status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
