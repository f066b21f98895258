// Orchestrator: owns the team and runs the project script
//
// planning -> designing -> building (backend and frontend joined) ->
// reviewing -> remediating (once, only if tasks are blocked) -> complete

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use super::errors::{AgentError, AgentResult};
use super::events::{AgentEvent, EventSink};
use super::llm::LanguageModel;
use super::messages::MessageBus;
use super::prompts::library;
use super::state::{ProjectPhase, ProjectState};
use super::tools::{truncate_chars, ToolBox};
use super::types::AgentInfo;
use super::worker::{Agent, Mailbox};
use crate::domain::message::{Message, MessageTarget};
use crate::domain::project::{Project, ProjectBrief, ProjectStatus};
use crate::domain::repositories::TaskStore;
use crate::domain::role::AgentRole;
use crate::domain::task::Task;

/// Largest slice of the design artifact handed to the frontend agent
pub const DESIGN_CONTEXT_CHARS: usize = 8000;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Each project gets `<output_base>/<project_name>`
    pub output_base: PathBuf,
    pub history_window: usize,
    /// File the designer writes and the frontend agent reads
    pub design_artifact: String,
}

impl OrchestratorConfig {
    pub fn new(output_base: impl Into<PathBuf>) -> Self {
        Self {
            output_base: output_base.into(),
            history_window: 40,
            design_artifact: "design-spec.md".to_string(),
        }
    }
}

/// A project that has claimed the orchestrator but not started running
#[derive(Debug)]
pub struct ProjectRun {
    brief: ProjectBrief,
    project: Project,
    output: PathBuf,
}

impl ProjectRun {
    pub fn project_name(&self) -> &str {
        &self.brief.project_name
    }

    pub fn project_id(&self) -> uuid::Uuid {
        self.project.id
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn TaskStore>,
    events: EventSink,
    bus: Arc<MessageBus>,
    agents: BTreeMap<AgentRole, Arc<Agent>>,
    state: Mutex<ProjectState>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn TaskStore>,
        model: Arc<dyn LanguageModel>,
        events: EventSink,
    ) -> Self {
        let bus = Arc::new(MessageBus::new(events.clone()));

        let mut agents = BTreeMap::new();
        for role in AgentRole::ALL {
            let tools = ToolBox::new(
                role,
                config.output_base.clone(),
                store.clone(),
                bus.clone(),
                events.clone(),
            );
            let agent = Arc::new(Agent::new(
                role,
                model.clone(),
                tools,
                events.clone(),
                config.history_window,
            ));
            bus.register(role, Arc::new(Mailbox::new(&agent)));
            agents.insert(role, agent);
        }

        Self {
            config,
            store,
            events,
            bus,
            agents,
            state: Mutex::new(ProjectState::default()),
        }
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn agent(&self, role: AgentRole) -> AgentResult<&Arc<Agent>> {
        self.agents.get(&role).ok_or(AgentError::AgentNotFound(role))
    }

    pub fn phase(&self) -> ProjectPhase {
        self.with_state(|s| s.phase())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ProjectState) -> T) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn enter(&self, next: ProjectPhase) -> AgentResult<()> {
        self.with_state(|s| s.transition(next))?;
        info!(phase = %next, "Project phase");
        Ok(())
    }

    pub fn agent_infos(&self) -> Vec<AgentInfo> {
        self.agents.values().map(|a| a.snapshot()).collect()
    }

    pub async fn tasks(&self) -> AgentResult<Vec<Task>> {
        Ok(self.store.all_tasks().await?)
    }

    pub async fn recent_messages(&self, limit: u32) -> AgentResult<Vec<Message>> {
        Ok(self.store.recent_messages(limit).await?)
    }

    /// Validate the brief and claim the orchestrator for it
    ///
    /// Fails with `ProjectInProgress` while another project is running.
    pub fn begin_project(&self, brief: ProjectBrief) -> AgentResult<ProjectRun> {
        brief.validate().map_err(AgentError::InvalidProject)?;

        let output = self.config.output_base.join(&brief.project_name);
        let project = Project::new(&brief, output.display().to_string());

        self.with_state(|state| {
            if state.phase().is_active() {
                return Err(AgentError::ProjectInProgress(
                    state.project_name.clone().unwrap_or_default(),
                ));
            }
            state.transition(ProjectPhase::Planning)?;
            state.project_id = Some(project.id);
            state.project_name = Some(brief.project_name.clone());
            state.output_path = Some(output.clone());
            Ok(())
        })?;

        info!(project = %brief.project_name, output = %output.display(), "Project started");
        Ok(ProjectRun {
            brief,
            project,
            output,
        })
    }

    /// Run the whole script for a brief and return the output directory
    pub async fn start_project(&self, brief: ProjectBrief) -> AgentResult<PathBuf> {
        let run = self.begin_project(brief)?;
        self.run_project(run).await
    }

    /// Run a claimed project to completion or failure
    pub async fn run_project(&self, run: ProjectRun) -> AgentResult<PathBuf> {
        match self.run_script(&run).await {
            Ok(()) => Ok(run.output),
            Err(e) => {
                error!(project = %run.brief.project_name, error = %e, "Project failed");
                if let Err(transition) = self.enter(ProjectPhase::Failed) {
                    warn!(error = %transition, "Could not mark phase failed");
                }
                self.events.emit(AgentEvent::Error {
                    agent: None,
                    message: e.to_string(),
                });
                if let Err(store_err) = self
                    .store
                    .set_project_status(run.project.id, ProjectStatus::Failed)
                    .await
                {
                    warn!(error = %store_err, "Could not mark project failed");
                }
                Err(e)
            }
        }
    }

    async fn run_script(&self, run: &ProjectRun) -> AgentResult<()> {
        let brief = &run.brief;

        tokio::fs::create_dir_all(&run.output).await?;
        for agent in self.agents.values() {
            agent.reset_for_project(run.output.clone()).await;
        }
        self.store.clear_tasks().await?;
        self.store.create_project(&run.project).await?;

        self.plan(brief).await?;

        self.enter(ProjectPhase::Designing)?;
        self.run_assigned(AgentRole::Designer).await?;

        self.enter(ProjectPhase::Building)?;
        let (backend, frontend) = tokio::join!(
            self.build(AgentRole::BackendDev, brief, "backend"),
            self.build_frontend(brief, &run.output),
        );
        backend?;
        frontend?;

        self.enter(ProjectPhase::Reviewing)?;
        self.review(brief).await?;

        self.remediate().await?;

        self.enter(ProjectPhase::Complete)?;
        self.store
            .set_project_status(run.project.id, ProjectStatus::Complete)
            .await?;
        self.events.emit(AgentEvent::ProjectComplete {
            project_name: brief.project_name.clone(),
            output_path: run.output.display().to_string(),
        });
        info!(project = %brief.project_name, "Project complete");
        Ok(())
    }

    async fn plan(&self, brief: &ProjectBrief) -> AgentResult<()> {
        let pm = self.agent(AgentRole::ProjectManager)?;
        pm.move_to("whiteboard");
        pm.handle_message(&library::planning().render(&[
            ("project_name", &brief.project_name),
            ("description", &brief.description),
        ]))
        .await?;

        let planned = self.store.all_tasks().await?;
        info!(tasks = planned.len(), "Planning finished");
        Ok(())
    }

    /// Every task on the board for `role`, one after another
    ///
    /// Returns how many tasks ran.
    async fn run_assigned(&self, role: AgentRole) -> AgentResult<usize> {
        let tasks = self.store.tasks_by_assignee(role).await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let agent = self.agent(role)?;
        agent.move_to(role_desk(agent));
        for task in &tasks {
            agent.assign_task(task).await?;
        }
        Ok(tasks.len())
    }

    async fn build(&self, role: AgentRole, brief: &ProjectBrief, area: &str) -> AgentResult<()> {
        if self.run_assigned(role).await? > 0 {
            return Ok(());
        }

        let agent = self.agent(role)?;
        agent.move_to(role_desk(agent));
        agent
            .handle_message(&library::build_fallback().render(&[
                ("project_name", &brief.project_name),
                ("description", &brief.description),
                ("area", area),
            ]))
            .await?;
        Ok(())
    }

    async fn build_frontend(&self, brief: &ProjectBrief, output: &Path) -> AgentResult<()> {
        let frontend = self.agent(AgentRole::FrontendDev)?;
        let artifact = output.join(&self.config.design_artifact);

        match tokio::fs::read_to_string(&artifact).await {
            Ok(content) => {
                frontend.defer_context(library::design_context().render(&[
                    ("file", &self.config.design_artifact),
                    ("content", &truncate_chars(&content, DESIGN_CONTEXT_CHARS)),
                ]));
            }
            Err(e) => {
                info!(file = %artifact.display(), error = %e, "No design artifact for frontend");
            }
        }

        self.build(AgentRole::FrontendDev, brief, "frontend").await
    }

    async fn review(&self, brief: &ProjectBrief) -> AgentResult<()> {
        if self.run_assigned(AgentRole::QaTester).await? > 0 {
            return Ok(());
        }

        let qa = self.agent(AgentRole::QaTester)?;
        qa.move_to(role_desk(qa));
        qa.handle_message(
            &library::review_all().render(&[("project_name", &brief.project_name)]),
        )
        .await?;
        Ok(())
    }

    /// One fix-it instruction per blocked task, then a single re-review
    async fn remediate(&self) -> AgentResult<()> {
        let blocked: Vec<Task> = self
            .store
            .all_tasks()
            .await?
            .into_iter()
            .filter(Task::is_blocked)
            .collect();
        if blocked.is_empty() {
            return Ok(());
        }

        self.enter(ProjectPhase::Remediating)?;
        info!(blocked = blocked.len(), "Remediating blocked tasks");

        for task in &blocked {
            let owner = task.assignee.unwrap_or(AgentRole::ProjectManager);
            self.agent(owner)?
                .handle_message(&library::fix_blocked().render(&[
                    ("task_id", &task.id),
                    ("title", &task.title),
                    ("description", &task.description),
                ]))
                .await?;
        }

        let ids: Vec<&str> = blocked.iter().map(|t| t.id.as_str()).collect();
        self.agent(AgentRole::QaTester)?
            .handle_message(&library::re_review().render(&[("task_ids", &ids.join(", "))]))
            .await?;
        Ok(())
    }

    /// Hand a directive from the boss to the PM and return the PM's reply
    ///
    /// The reply is also recorded and emitted as a message from the PM to
    /// everyone. Does not touch the project phase.
    pub async fn send_directive(&self, text: &str) -> AgentResult<String> {
        info!(directive = %truncate_chars(text, 200), "Boss directive");
        self.events.emit(AgentEvent::BossCommand {
            text: text.to_string(),
        });
        let reply = self
            .agent(AgentRole::ProjectManager)?
            .handle_message(&library::directive().render(&[("text", text)]))
            .await?;

        self.store
            .save_message(AgentRole::ProjectManager, MessageTarget::All, &reply)
            .await?;
        self.events.emit(AgentEvent::Message {
            from: AgentRole::ProjectManager,
            to: MessageTarget::All,
            text: reply.clone(),
        });
        Ok(reply)
    }
}

fn role_desk(agent: &Agent) -> &'static str {
    super::prompts::role_profile(agent.role()).desk
}
