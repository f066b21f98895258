use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::message::{Message, MemoryKind, MemoryNote, MessageTarget};
use crate::domain::project::{Project, ProjectStatus};
use crate::domain::role::AgentRole;
use crate::domain::task::{Task, TaskPatch};

/// Errors raised by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence port for the task board, the message log, memory notes and
/// project records
///
/// Pure data access: no orchestration logic lives behind this trait. Every
/// single call must be atomic with respect to the row it touches; callers on
/// a multi-threaded runtime rely on that instead of locking around the store.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a task, or overwrite the row if the id already exists
    async fn create_task(&self, task: &Task) -> StoreResult<Task>;

    /// Insert a task unless the id is taken; an existing row is left as is
    ///
    /// Returns whether the row was inserted.
    async fn insert_task_if_absent(&self, task: &Task) -> StoreResult<bool>;

    /// Merge the supplied fields into an existing task and stamp `updated_at`
    ///
    /// Returns `None` when no task has this id.
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> StoreResult<Option<Task>>;

    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Every task, highest priority first, ties in insertion order
    async fn all_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Tasks for one assignee, highest priority first, ties in insertion order
    async fn tasks_by_assignee(&self, assignee: AgentRole) -> StoreResult<Vec<Task>>;

    /// Unconditional wipe of the board, used when a new project starts
    async fn clear_tasks(&self) -> StoreResult<()>;

    async fn save_message(&self, from: AgentRole, to: MessageTarget, text: &str)
        -> StoreResult<Message>;

    /// Most recent messages first
    async fn recent_messages(&self, limit: u32) -> StoreResult<Vec<Message>>;

    async fn add_memory(
        &self,
        agent: AgentRole,
        content: &str,
        importance: i64,
        kind: MemoryKind,
    ) -> StoreResult<MemoryNote>;

    /// Notes for one agent, most important first, newest first on ties
    async fn memories(&self, agent: AgentRole, limit: u32) -> StoreResult<Vec<MemoryNote>>;

    async fn create_project(&self, project: &Project) -> StoreResult<()>;

    async fn set_project_status(&self, id: Uuid, status: ProjectStatus) -> StoreResult<()>;

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
}
