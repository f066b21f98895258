// Role agent: one LLM conversation plus the tool loop that drives it

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::errors::{AgentError, AgentResult};
use super::events::{AgentEvent, EventSink};
use super::history::ConversationHistory;
use super::llm::{join_text, ContentBlock, LanguageModel, ModelRequest, Turn};
use super::messages::MessageHandler;
use super::prompts::{library, role_profile, RoleProfile};
use super::tools::{tool_specs, truncate_chars, ToolBox};
use super::types::{busy_status, AgentInfo, AgentStatus};
use crate::domain::message::MemoryKind;
use crate::domain::role::AgentRole;
use crate::domain::task::Task;

/// Length of the thinking excerpt put on the event stream
pub const THOUGHT_EXCERPT_CHARS: usize = 200;
/// Extra model rounds spent on notes that arrived as a loop was ending
pub const MAX_DEFERRED_ROUNDS: usize = 3;
const MEMORY_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone)]
struct Presence {
    status: AgentStatus,
    current_task: Option<Task>,
    location: String,
}

/// An LLM-backed team member with a fixed role
///
/// At most one tool loop runs per agent: the conversation sits behind an
/// async mutex. Messages from other agents that arrive while the loop is
/// running are parked and folded into the next user turn instead of
/// re-entering the loop.
pub struct Agent {
    role: AgentRole,
    profile: RoleProfile,
    model: Arc<dyn LanguageModel>,
    tools: ToolBox,
    events: EventSink,
    conversation: AsyncMutex<ConversationHistory>,
    presence: Mutex<Presence>,
    deferred: Mutex<Vec<String>>,
}

impl Agent {
    pub fn new(
        role: AgentRole,
        model: Arc<dyn LanguageModel>,
        tools: ToolBox,
        events: EventSink,
        history_window: usize,
    ) -> Self {
        let profile = role_profile(role);
        Self {
            role,
            profile,
            model,
            tools,
            events,
            conversation: AsyncMutex::new(ConversationHistory::new(history_window)),
            presence: Mutex::new(Presence {
                status: AgentStatus::Idle,
                current_task: None,
                location: profile.desk.to_string(),
            }),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    pub fn status(&self) -> AgentStatus {
        self.presence().status
    }

    fn presence(&self) -> Presence {
        self.presence
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn update_presence<F: FnOnce(&mut Presence)>(&self, f: F) -> Presence {
        let mut presence = self
            .presence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut presence);
        presence.clone()
    }

    pub fn set_status(&self, status: AgentStatus) {
        let presence = self.update_presence(|p| p.status = status);
        self.events.emit(AgentEvent::AgentStatus {
            agent: self.role,
            status,
            task: presence.current_task.map(|t| t.title),
        });
    }

    pub fn move_to(&self, destination: &str) {
        self.update_presence(|p| p.location = destination.to_string());
        self.events.emit(AgentEvent::AgentMove {
            agent: self.role,
            destination: destination.to_string(),
        });
    }

    pub fn snapshot(&self) -> AgentInfo {
        let presence = self.presence();
        AgentInfo {
            role: self.role,
            name: self.profile.name.to_string(),
            status: presence.status,
            current_task: presence.current_task.map(|t| t.title),
            location: presence.location,
        }
    }

    /// Queue text for the next user turn of this agent
    pub fn defer_context(&self, text: impl Into<String>) {
        let mut deferred = self
            .deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        deferred.push(text.into());
    }

    fn take_deferred(&self) -> Vec<String> {
        let mut deferred = self
            .deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *deferred)
    }

    /// Forget the previous project and work in `sandbox` from now on
    pub async fn reset_for_project(&self, sandbox: PathBuf) {
        self.conversation.lock().await.clear();
        self.take_deferred();
        let desk = self.profile.desk.to_string();
        self.update_presence(|p| {
            p.status = AgentStatus::Idle;
            p.current_task = None;
            p.location = desk;
        });
        self.tools.set_sandbox(sandbox);
    }

    /// Run one instruction to completion and return the final reply
    pub async fn handle_message(&self, text: &str) -> AgentResult<String> {
        let mut history = self.conversation.lock().await;
        self.converse(&mut history, text).await
    }

    /// Deliver a message from another agent
    ///
    /// If this agent's loop is already running, the message is parked for
    /// its next turn and the sender gets an acknowledgement instead of a
    /// reply.
    pub async fn receive_message(&self, from: AgentRole, text: &str) -> AgentResult<String> {
        let note = format!("[Message from {}]: {}", from, text);
        match self.conversation.try_lock() {
            Ok(mut history) => self.converse(&mut history, &note).await,
            Err(_) => {
                debug!(agent = %self.role, %from, "Agent busy, message deferred");
                self.defer_context(note);
                Ok(format!(
                    "{} is busy and will read your message before their next step.",
                    self.profile.name
                ))
            }
        }
    }

    /// Work on a task from the board until the model stops calling tools
    pub async fn assign_task(&self, task: &Task) -> AgentResult<String> {
        info!(agent = %self.role, task = %task.id, "Task assigned");
        self.update_presence(|p| p.current_task = Some(task.clone()));
        self.set_status(AgentStatus::Working);

        let priority = task.priority.to_string();
        let instruction = library::task_assignment().render(&[
            ("task_id", &task.id),
            ("title", &task.title),
            ("priority", &priority),
            ("description", &task.description),
        ]);
        let result = self.handle_message(&instruction).await;

        self.update_presence(|p| p.current_task = None);
        let reply = result?;

        let importance = if task.priority <= 0 {
            5
        } else {
            task.priority.clamp(1, 10)
        };
        let note = format!(
            "Finished {} ({}): {}",
            task.id,
            task.title,
            truncate_chars(&reply, MEMORY_EXCERPT_CHARS)
        );
        if let Err(e) = self
            .tools
            .store()
            .add_memory(self.role, &note, importance, MemoryKind::Observation)
            .await
        {
            warn!(agent = %self.role, error = %e, "Failed to record memory note");
        }

        Ok(reply)
    }

    async fn converse(&self, history: &mut ConversationHistory, text: &str) -> AgentResult<String> {
        let result = self.tool_loop(history, text).await;
        if let Err(e) = &result {
            warn!(agent = %self.role, error = %e, "Agent turn failed");
            self.set_status(AgentStatus::Idle);
        }
        result
    }

    async fn tool_loop(&self, history: &mut ConversationHistory, text: &str) -> AgentResult<String> {
        let mut opening: Vec<ContentBlock> = self
            .take_deferred()
            .into_iter()
            .map(ContentBlock::text)
            .collect();
        opening.push(ContentBlock::text(text));
        history.push(Turn::user(opening));

        self.set_status(AgentStatus::Thinking);
        self.events.emit(AgentEvent::AgentThinking {
            agent: self.role,
            thought: truncate_chars(text, THOUGHT_EXCERPT_CHARS),
        });

        let mut deferred_rounds = 0;
        loop {
            let request = ModelRequest {
                agent: self.role,
                system: self.profile.prompt.to_string(),
                messages: history.request_view(),
                tools: tool_specs(),
            };
            let response = self.model.complete(&request).await?;

            if response.wants_tools() {
                let mut results = Vec::new();
                for block in &response.content {
                    let ContentBlock::ToolUse { id, name, input } = block else {
                        continue;
                    };
                    let status = if name == "send_message" {
                        AgentStatus::Talking
                    } else {
                        busy_status(self.role)
                    };
                    self.set_status(status);

                    let outcome = self.tools.execute(name, input).await;
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: outcome.to_model_text(),
                        is_error: !outcome.success,
                    });
                }
                results.extend(self.take_deferred().into_iter().map(ContentBlock::text));

                history.push(Turn::assistant(response.content));
                history.push(Turn::user(results));
                continue;
            }

            let reply = join_text(&response.content);
            let stored = if reply.trim().is_empty() {
                "(no reply)".to_string()
            } else {
                reply.clone()
            };
            history.push(Turn::assistant(vec![ContentBlock::text(stored)]));

            let late = self.take_deferred();
            if !late.is_empty() {
                if deferred_rounds < MAX_DEFERRED_ROUNDS {
                    deferred_rounds += 1;
                    history.push(Turn::user(late.into_iter().map(ContentBlock::text).collect()));
                    self.set_status(AgentStatus::Thinking);
                    continue;
                }
                // Out of rounds: keep them for the next instruction
                for note in late {
                    self.defer_context(note);
                }
            }

            self.set_status(AgentStatus::Idle);
            return Ok(reply);
        }
    }
}

/// Bus-side handle on an agent
///
/// Holds a weak reference so the bus never keeps an agent alive.
pub struct Mailbox {
    role: AgentRole,
    agent: Weak<Agent>,
}

impl Mailbox {
    pub fn new(agent: &Arc<Agent>) -> Self {
        Self {
            role: agent.role(),
            agent: Arc::downgrade(agent),
        }
    }
}

#[async_trait]
impl MessageHandler for Mailbox {
    async fn handle(&self, from: AgentRole, text: &str) -> AgentResult<String> {
        let agent = self
            .agent
            .upgrade()
            .ok_or(AgentError::AgentNotFound(self.role))?;
        agent.receive_message(from, text).await
    }
}
