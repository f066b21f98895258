use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::message::{MemoryKind, MemoryNote, Message, MessageTarget};
use crate::domain::project::{Project, ProjectStatus};
use crate::domain::repositories::{StoreError, StoreResult, TaskStore};
use crate::domain::role::AgentRole;
use crate::domain::task::{Task, TaskPatch, TaskStatus};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        assignee TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        priority INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        dependencies TEXT NOT NULL DEFAULT '[]',
        files TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_agent TEXT NOT NULL,
        to_agent TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent TEXT NOT NULL,
        content TEXT NOT NULL,
        importance INTEGER NOT NULL DEFAULT 5,
        timestamp TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'observation'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        brief TEXT NOT NULL,
        output_path TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL
    )
    "#,
];

const TASK_COLUMNS: &str = "id, title, description, assignee, status, priority, \
                            created_at, updated_at, dependencies, files";

/// SQLite implementation of TaskStore
///
/// Four independent tables: tasks, messages, memories and projects. List
/// columns hold JSON arrays. Ties in priority order fall back to `rowid`, which
/// is the insertion order of the row.
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Opens (creating if needed) the database at `url` and applies the schema
    ///
    /// # Arguments
    /// * `url` - SQLx connection string, e.g. `sqlite://agency.db` or
    ///   `sqlite::memory:`
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection, so the
        // pool must hold exactly one and never recycle it.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn parse_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_column<T: FromStr<Err = String>>(raw: &str) -> StoreResult<T> {
    raw.parse().map_err(StoreError::Corrupt)
}

fn row_to_task(row: &SqliteRow) -> StoreResult<Task> {
    let assignee: Option<String> = row.try_get("assignee")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let dependencies: String = row.try_get("dependencies")?;
    let files: String = row.try_get("files")?;

    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        assignee: assignee
            .filter(|a| !a.is_empty())
            .map(|a| parse_column::<AgentRole>(&a))
            .transpose()?,
        status: parse_column::<TaskStatus>(&status)?,
        priority: row.try_get("priority")?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        dependencies: serde_json::from_str(&dependencies)?,
        files: serde_json::from_str(&files)?,
    })
}

fn row_to_message(row: &SqliteRow) -> StoreResult<Message> {
    let from: String = row.try_get("from_agent")?;
    let to: String = row.try_get("to_agent")?;
    let timestamp: String = row.try_get("timestamp")?;

    Ok(Message {
        from: parse_column(&from)?,
        to: parse_column(&to)?,
        text: row.try_get("content")?,
        timestamp: parse_time(&timestamp)?,
    })
}

fn row_to_memory(row: &SqliteRow) -> StoreResult<MemoryNote> {
    let agent: String = row.try_get("agent")?;
    let kind: String = row.try_get("kind")?;
    let timestamp: String = row.try_get("timestamp")?;

    Ok(MemoryNote {
        id: row.try_get("id")?,
        agent: parse_column(&agent)?,
        content: row.try_get("content")?,
        importance: row.try_get("importance")?,
        kind: parse_column::<MemoryKind>(&kind)?,
        timestamp: parse_time(&timestamp)?,
    })
}

fn row_to_project(row: &SqliteRow) -> StoreResult<Project> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Project {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        name: row.try_get("name")?,
        brief: row.try_get("brief")?,
        output_path: row.try_get("output_path")?,
        status: parse_column::<ProjectStatus>(&status)?,
        created_at: parse_time(&created_at)?,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_task(&self, task: &Task) -> StoreResult<Task> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, title, description, assignee, status, priority,
                created_at, updated_at, dependencies, files
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                assignee = excluded.assignee,
                status = excluded.status,
                priority = excluded.priority,
                updated_at = excluded.updated_at,
                dependencies = excluded.dependencies,
                files = excluded.files
            "#,
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assignee.map(|a| a.as_str()))
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(serde_json::to_string(&task.dependencies)?)
        .bind(serde_json::to_string(&task.files)?)
        .execute(&self.pool)
        .await?;

        Ok(task.clone())
    }

    async fn insert_task_if_absent(&self, task: &Task) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                id, title, description, assignee, status, priority,
                created_at, updated_at, dependencies, files
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assignee.map(|a| a.as_str()))
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(serde_json::to_string(&task.dependencies)?)
        .bind(serde_json::to_string(&task.files)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> StoreResult<Option<Task>> {
        let files = patch.files.as_ref().map(serde_json::to_string).transpose()?;

        // One statement, so the merge is atomic for the row
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                status = COALESCE(?, status),
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                assignee = COALESCE(?, assignee),
                priority = COALESCE(?, priority),
                files = COALESCE(?, files),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.assignee.map(|a| a.as_str()))
        .bind(patch.priority)
        .bind(files)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_task(id).await
    }

    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_task).transpose()
    }

    async fn all_tasks(&self) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks ORDER BY priority DESC, rowid ASC",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    async fn tasks_by_assignee(&self, assignee: AgentRole) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE assignee = ? ORDER BY priority DESC, rowid ASC",
            TASK_COLUMNS
        ))
        .bind(assignee.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    async fn clear_tasks(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM tasks").execute(&self.pool).await?;
        Ok(())
    }

    async fn save_message(
        &self,
        from: AgentRole,
        to: MessageTarget,
        text: &str,
    ) -> StoreResult<Message> {
        let message = Message {
            from,
            to,
            text: text.to_string(),
            timestamp: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (from_agent, to_agent, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(text)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    async fn recent_messages(&self, limit: u32) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT from_agent, to_agent, content, timestamp
            FROM messages
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }

    async fn add_memory(
        &self,
        agent: AgentRole,
        content: &str,
        importance: i64,
        kind: MemoryKind,
    ) -> StoreResult<MemoryNote> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO memories (agent, content, importance, timestamp, kind) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(agent.as_str())
        .bind(content)
        .bind(importance)
        .bind(timestamp.to_rfc3339())
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(MemoryNote {
            id: result.last_insert_rowid(),
            agent,
            content: content.to_string(),
            importance,
            kind,
            timestamp,
        })
    }

    async fn memories(&self, agent: AgentRole, limit: u32) -> StoreResult<Vec<MemoryNote>> {
        let rows = sqlx::query(
            r#"
            SELECT id, agent, content, importance, timestamp, kind
            FROM memories
            WHERE agent = ?
            ORDER BY importance DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(agent.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_memory).collect()
    }

    async fn create_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, brief, output_path, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(&project.brief)
        .bind(&project.output_path)
        .bind(project.status.as_str())
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_project_status(&self, id: Uuid, status: ProjectStatus) -> StoreResult<()> {
        sqlx::query("UPDATE projects SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, brief, output_path, status, created_at FROM projects WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_project).transpose()
    }
}
