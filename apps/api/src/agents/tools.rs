// Tool declarations and the sandboxed executor behind them
//
// Every call produces a `ToolOutcome`; nothing in here aborts an agent loop.

use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::errors::AgentError;
use super::events::{AgentEvent, EventSink};
use super::llm::ToolSpec;
use super::messages::{Delivery, MessageBus};
use crate::domain::message::MessageTarget;
use crate::domain::repositories::TaskStore;
use crate::domain::role::AgentRole;
use crate::domain::task::{Task, TaskPatch, TaskStatus};

/// Upper bound on a serialized result before it enters the conversation
pub const MAX_TOOL_RESULT_CHARS: usize = 4000;
pub const COMMAND_OUTPUT_CHARS: usize = 2000;
pub const COMMAND_ERROR_CHARS: usize = 1000;
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const SKIPPED_DIRS: [&str; 2] = ["node_modules", ".git"];

/// First `max` characters of `s`, never splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

/// Result of one tool call as the model sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// JSON text, cut to `MAX_TOOL_RESULT_CHARS`
    pub fn to_model_text(&self) -> String {
        let text = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"unserializable result: {}"}}"#, e)
        });
        truncate_chars(&text, MAX_TOOL_RESULT_CHARS)
    }
}

impl From<Result<Value, String>> for ToolOutcome {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(data) => ToolOutcome::ok(data),
            Err(error) => ToolOutcome::failed(error),
        }
    }
}

/// The six tools offered to every agent
pub fn tool_specs() -> Vec<ToolSpec> {
    let roles = AgentRole::wire_ids();
    let statuses: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_str()).collect();

    vec![
        ToolSpec {
            name: "write_file",
            description: "Write content to a file in the project. Creates directories as needed.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to project root" },
                    "content": { "type": "string", "description": "File content to write" }
                },
                "required": ["path", "content"]
            }),
        },
        ToolSpec {
            name: "read_file",
            description: "Read the contents of a file in the project.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to project root" }
                },
                "required": ["path"]
            }),
        },
        ToolSpec {
            name: "run_command",
            description: "Run a shell command in the project directory, e.g. installing dependencies or running tests. Times out after 30 seconds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to run" }
                },
                "required": ["command"]
            }),
        },
        ToolSpec {
            name: "send_message",
            description: "Send a message to another agent on the team. They will read it and may reply.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "enum": roles, "description": "Role of the recipient" },
                    "message": { "type": "string", "description": "The message content" }
                },
                "required": ["to", "message"]
            }),
        },
        ToolSpec {
            name: "update_task",
            description: "Create or update a task on the board. Include a title and description when creating a task.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string", "description": "Task id, e.g. task-1" },
                    "status": { "type": "string", "enum": statuses, "description": "Task status" },
                    "title": { "type": "string", "description": "Task title (needed when creating a task)" },
                    "description": { "type": "string", "description": "What needs to be done" },
                    "assignee": { "type": "string", "enum": roles, "description": "Role the task is assigned to" },
                    "priority": { "type": "integer", "description": "Higher runs first" },
                    "files": { "type": "array", "items": { "type": "string" }, "description": "Files this task touches" }
                },
                "required": ["taskId", "status"]
            }),
        },
        ToolSpec {
            name: "list_files",
            description: "List all files in the project directory or one of its subdirectories.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to project root. Defaults to the root." }
                },
                "required": []
            }),
        },
    ]
}

fn str_arg<'a>(input: &'a Value, key: &str) -> Result<&'a str, String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required input: {}", key))
}

fn opt_str_arg<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Relative path with forward slashes regardless of platform
fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Executes tool calls for one agent inside its project directory
pub struct ToolBox {
    role: AgentRole,
    sandbox: RwLock<PathBuf>,
    store: Arc<dyn TaskStore>,
    bus: Arc<MessageBus>,
    events: EventSink,
    command_timeout: Duration,
}

impl ToolBox {
    pub fn new(
        role: AgentRole,
        sandbox: PathBuf,
        store: Arc<dyn TaskStore>,
        bus: Arc<MessageBus>,
        events: EventSink,
    ) -> Self {
        Self {
            role,
            sandbox: RwLock::new(sandbox),
            store,
            bus,
            events,
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    /// Replace the default 30 s limit on `run_command`
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn sandbox(&self) -> PathBuf {
        self.sandbox
            .read()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn set_sandbox(&self, sandbox: PathBuf) {
        match self.sandbox.write() {
            Ok(mut current) => *current = sandbox,
            Err(poisoned) => *poisoned.into_inner() = sandbox,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Maps a model-supplied path into the sandbox
    fn resolve(&self, relative: &str) -> Result<PathBuf, String> {
        let path = Path::new(relative);
        let escapes = path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(format!("Path escapes project directory: {}", relative));
        }

        let root = self.sandbox();
        let full = root.join(path);
        if !full.starts_with(&root) {
            return Err(format!("Path escapes project directory: {}", relative));
        }
        Ok(full)
    }

    /// Run one tool call. Unknown tools and bad inputs become failures.
    pub async fn execute(&self, name: &str, input: &Value) -> ToolOutcome {
        debug!(agent = %self.role, tool = name, "Executing tool");

        let result = match name {
            "write_file" => self.write_file(input).await,
            "read_file" => self.read_file(input).await,
            "run_command" => self.run_command(input).await,
            "send_message" => self.send_message(input).await,
            "update_task" => self.update_task(input).await,
            "list_files" => self.list_files(input),
            other => Err(format!("Unknown tool: {}", other)),
        };

        if let Err(error) = &result {
            debug!(agent = %self.role, tool = name, %error, "Tool failed");
        }
        result.into()
    }

    async fn write_file(&self, input: &Value) -> Result<Value, String> {
        let relative = str_arg(input, "path")?;
        let content = str_arg(input, "content")?;
        let full = self.resolve(relative)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create directories for {}: {}", relative, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| format!("Failed to write {}: {}", relative, e))?;

        self.events.emit(AgentEvent::FileWrite {
            agent: self.role,
            path: relative.to_string(),
            content: content.to_string(),
        });
        Ok(json!(format!("Wrote {}", relative)))
    }

    async fn read_file(&self, input: &Value) -> Result<Value, String> {
        let relative = str_arg(input, "path")?;
        let full = self.resolve(relative)?;

        if !tokio::fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(format!("File not found: {}", relative));
        }
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| format!("Failed to read {}: {}", relative, e))?;

        self.events.emit(AgentEvent::FileRead {
            agent: self.role,
            path: relative.to_string(),
        });
        Ok(json!(content))
    }

    async fn run_command(&self, input: &Value) -> Result<Value, String> {
        let command = str_arg(input, "command")?;
        let result = self.spawn_shell(command).await;

        let output = match &result {
            Ok(stdout) => stdout.clone(),
            Err(error) => format!("Error: {}", error),
        };
        self.events.emit(AgentEvent::CommandRun {
            agent: self.role,
            command: command.to_string(),
            output,
        });

        result.map(Value::String)
    }

    /// Stdout on success (already truncated), error text otherwise
    async fn spawn_shell(&self, command: &str) -> Result<String, String> {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        cmd.current_dir(self.sandbox())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| truncate_chars(&format!("Failed to start command: {}", e), COMMAND_ERROR_CHARS))?;

        let output = match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(truncate_chars(&format!("Command failed: {}", e), COMMAND_ERROR_CHARS))
            }
            Err(_) => {
                warn!(agent = %self.role, command, "Command timed out");
                return Err(format!(
                    "Command timed out after {:?}: {}",
                    self.command_timeout,
                    truncate_chars(command, 200)
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Ok(truncate_chars(&stdout, COMMAND_OUTPUT_CHARS));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(truncate_chars(
            &format!("Command failed (exit {}): {}\n{}", code, command, detail.trim_end()),
            COMMAND_ERROR_CHARS,
        ))
    }

    async fn send_message(&self, input: &Value) -> Result<Value, String> {
        let to: AgentRole = str_arg(input, "to")?.parse()?;
        let message = str_arg(input, "message")?;

        self.store
            .save_message(self.role, MessageTarget::Agent(to), message)
            .await
            .map_err(|e| format!("Failed to record message: {}", e))?;

        match self.bus.send(self.role, to, message).await {
            Ok(Delivery::Replied(reply)) if reply.is_empty() => Ok(json!(format!("Message sent to {}", to))),
            Ok(Delivery::Replied(reply)) => Ok(json!(format!("Message sent to {}. Reply: {}", to, reply))),
            Ok(Delivery::Queued) => Ok(json!(format!("Message to {} queued.", to))),
            Err(e) => {
                warn!(agent = %self.role, %to, error = %e, "Message delivery failed");
                Err(AgentError::MessageDeliveryFailed(e.to_string()).to_string())
            }
        }
    }

    async fn update_task(&self, input: &Value) -> Result<Value, String> {
        let id = str_arg(input, "taskId")?;
        let status: TaskStatus = str_arg(input, "status")?.parse()?;
        let assignee = opt_str_arg(input, "assignee")
            .map(str::parse::<AgentRole>)
            .transpose()?;
        let files = input.get("files").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let patch = TaskPatch {
            status: Some(status),
            title: opt_str_arg(input, "title").map(str::to_string),
            description: opt_str_arg(input, "description").map(str::to_string),
            assignee,
            priority: input.get("priority").and_then(Value::as_i64),
            files,
        };

        // An existing row is merged into, never overwritten
        let fresh = Task::create(id, status, &patch, Some(self.role));
        let inserted = self
            .store
            .insert_task_if_absent(&fresh)
            .await
            .map_err(|e| format!("Failed to create task {}: {}", id, e))?;
        let task = if inserted {
            fresh
        } else {
            self.store
                .update_task(id, &patch)
                .await
                .map_err(|e| format!("Failed to update task {}: {}", id, e))?
                .ok_or_else(|| format!("Task {} disappeared during update", id))?
        };

        self.events.emit(AgentEvent::TaskUpdate { task });
        Ok(json!(format!("Task {} -> {}", id, status)))
    }

    fn list_files(&self, input: &Value) -> Result<Value, String> {
        let relative = opt_str_arg(input, "path");
        let dir = match relative {
            Some(rel) => self.resolve(rel)?,
            None => self.sandbox(),
        };
        if !dir.is_dir() {
            return Err(format!("Directory not found: {}", relative.unwrap_or("/")));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !SKIPPED_DIRS.iter().any(|skip| e.file_name() == *skip));

        for entry in walker.filter_map(|e| e.ok()) {
            let Ok(rel) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let mut shown = display_path(rel);
            if entry.file_type().is_dir() {
                shown.push('/');
            }
            entries.push(Value::String(shown));
        }
        Ok(Value::Array(entries))
    }
}
