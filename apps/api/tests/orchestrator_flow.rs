//! End-to-end runs of the project script against a scripted model

mod common;

use agency_api::agents::errors::AgentError;
use agency_api::agents::events::AgentEvent;
use agency_api::agents::llm::{ContentBlock, ModelResponse};
use agency_api::agents::state::ProjectPhase;
use agency_api::domain::message::MessageTarget;
use agency_api::domain::project::{ProjectBrief, ProjectStatus};
use agency_api::domain::repositories::TaskStore;
use agency_api::domain::role::AgentRole;
use agency_api::domain::task::TaskStatus;
use common::{drain, setup_team, ScriptedModel};
use serde_json::json;

const FIX_MARKER: &str = "is blocked after review";
const RE_REVIEW_MARKER: &str = "This is the final review";

fn script_plan(model: &ScriptedModel) {
    model.script(
        AgentRole::ProjectManager,
        vec![
            ModelResponse::tool_calls(vec![
                (
                    "p1",
                    "update_task",
                    json!({"taskId": "task-1", "status": "pending", "title": "Design the layout",
                           "description": "Write design-spec.md", "assignee": "designer", "priority": 3}),
                ),
                (
                    "p2",
                    "update_task",
                    json!({"taskId": "task-2", "status": "pending", "title": "Todo API",
                           "description": "CRUD endpoints", "assignee": "backend-dev", "priority": 2}),
                ),
                (
                    "p3",
                    "update_task",
                    json!({"taskId": "task-3", "status": "pending", "title": "Todo UI",
                           "description": "List and form", "assignee": "frontend-dev", "priority": 1}),
                ),
            ]),
            ModelResponse::text("Plan is on the board."),
        ],
    );
    model.script(
        AgentRole::Designer,
        vec![
            ModelResponse::tool_calls(vec![(
                "d1",
                "write_file",
                json!({"path": "design-spec.md", "content": "Use a calm blue palette."}),
            )]),
            ModelResponse::text("Design written."),
        ],
    );
    model.script(
        AgentRole::BackendDev,
        vec![
            ModelResponse::tool_calls(vec![
                ("b1", "write_file", json!({"path": "server/index.js", "content": "// api"})),
                ("b2", "update_task", json!({"taskId": "task-2", "status": "done"})),
            ]),
            ModelResponse::text("API done."),
        ],
    );
    model.script(
        AgentRole::FrontendDev,
        vec![
            ModelResponse::tool_calls(vec![(
                "f1",
                "write_file",
                json!({"path": "src/App.tsx", "content": "export default function App() {}"}),
            )]),
            ModelResponse::text("UI done."),
        ],
    );
}

fn block_task(id: &str) -> ModelResponse {
    ModelResponse::tool_calls(vec![(
        "q-block",
        "update_task",
        json!({"taskId": id, "status": "blocked"}),
    )])
}

fn first_index(events: &[AgentEvent], pred: impl Fn(&AgentEvent) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("expected event not found in {events:#?}"))
}

#[tokio::test]
async fn demo_project_runs_phases_in_order() {
    let team = setup_team().await;
    script_plan(&team.model);
    let mut rx = team.events.subscribe();

    let output = team
        .orchestrator
        .start_project(ProjectBrief::new("demo", "build a todo app"))
        .await
        .unwrap();

    assert_eq!(output, team.output.path().join("demo"));
    assert!(output.join("design-spec.md").is_file());
    assert!(output.join("server/index.js").is_file());
    assert!(output.join("src/App.tsx").is_file());
    assert_eq!(team.orchestrator.phase(), ProjectPhase::Complete);

    let events = drain(&mut rx);
    let by = |role: AgentRole| move |e: &AgentEvent| e.agent() == Some(role);

    let pm = first_index(&events, by(AgentRole::ProjectManager));
    let task = first_index(&events, |e| {
        matches!(e, AgentEvent::TaskUpdate { task } if task.assignee.is_some())
    });
    let designer = first_index(&events, by(AgentRole::Designer));
    let backend = first_index(&events, by(AgentRole::BackendDev));
    let frontend = first_index(&events, by(AgentRole::FrontendDev));
    let qa = first_index(&events, by(AgentRole::QaTester));

    assert!(pm < task);
    assert!(task < designer);
    assert!(designer < backend && designer < frontend);
    assert!(backend < qa && frontend < qa);
    assert_eq!(
        events.last(),
        Some(&AgentEvent::ProjectComplete {
            project_name: "demo".to_string(),
            output_path: output.display().to_string(),
        })
    );
    assert!(matches!(
        &events[pm],
        AgentEvent::AgentMove { destination, .. } if destination == "whiteboard"
    ));
}

#[tokio::test]
async fn frontend_receives_design_artifact_before_its_task() {
    let team = setup_team().await;
    script_plan(&team.model);

    team.orchestrator
        .start_project(ProjectBrief::new("demo", "build a todo app"))
        .await
        .unwrap();

    let requests = team.model.requests_for(AgentRole::FrontendDev);
    let opening = requests[0].messages[0].text();
    assert!(opening.contains("Use a calm blue palette."));
    assert!(opening.contains("Task ID: task-3"));
    assert!(opening.find("blue palette") < opening.find("Task ID"));
}

#[tokio::test]
async fn tasks_run_in_priority_order_and_leave_memory_notes() {
    let team = setup_team().await;
    team.model.script(
        AgentRole::ProjectManager,
        vec![
            ModelResponse::tool_calls(vec![
                ("p1", "update_task", json!({"taskId": "task-1", "status": "pending",
                    "title": "Low", "assignee": "backend-dev", "priority": 1})),
                ("p2", "update_task", json!({"taskId": "task-2", "status": "pending",
                    "title": "High", "assignee": "backend-dev", "priority": 9})),
            ]),
            ModelResponse::text("Planned."),
        ],
    );

    team.orchestrator
        .start_project(ProjectBrief::new("ordering", "two backend tasks"))
        .await
        .unwrap();

    let openings: Vec<String> = team
        .model
        .requests_for(AgentRole::BackendDev)
        .iter()
        .map(|r| r.messages.last().unwrap().text())
        .filter(|t| t.contains("Task ID"))
        .collect();
    assert_eq!(openings.len(), 2);
    assert!(openings[0].contains("Task ID: task-2"));
    assert!(openings[1].contains("Task ID: task-1"));

    let notes = team.store.memories(AgentRole::BackendDev, 10).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].importance, 9);
    assert!(notes[0].content.contains("task-2"));
}

#[tokio::test]
async fn no_blocked_tasks_skips_remediation() {
    let team = setup_team().await;
    script_plan(&team.model);

    team.orchestrator
        .start_project(ProjectBrief::new("clean", "build a todo app"))
        .await
        .unwrap();

    for role in [AgentRole::FrontendDev, AgentRole::BackendDev, AgentRole::Designer] {
        assert_eq!(team.model.instructions_containing(role, FIX_MARKER), 0);
    }
    assert_eq!(team.model.instructions_containing(AgentRole::QaTester, RE_REVIEW_MARKER), 0);
    // Generic review, since QA had no tasks of its own
    assert_eq!(team.model.instructions_containing(AgentRole::QaTester, "review-notes.md"), 1);
}

#[tokio::test]
async fn each_blocked_task_gets_one_fix_and_one_re_review() {
    let team = setup_team().await;
    script_plan(&team.model);
    team.model.script(
        AgentRole::QaTester,
        vec![
            ModelResponse::tool_calls(vec![
                ("q1", "update_task", json!({"taskId": "task-2", "status": "blocked"})),
                ("q2", "update_task", json!({"taskId": "task-3", "status": "blocked"})),
            ]),
            ModelResponse::text("Two tasks fail review."),
            // Re-review blocks again; there is no second pass
            block_task("task-3"),
            ModelResponse::text("Still broken."),
        ],
    );

    team.orchestrator
        .start_project(ProjectBrief::new("fixes", "build a todo app"))
        .await
        .unwrap();

    assert_eq!(team.model.instructions_containing(AgentRole::BackendDev, FIX_MARKER), 1);
    assert_eq!(team.model.instructions_containing(AgentRole::FrontendDev, FIX_MARKER), 1);
    assert_eq!(team.model.instructions_containing(AgentRole::Designer, FIX_MARKER), 0);
    assert_eq!(team.model.instructions_containing(AgentRole::QaTester, RE_REVIEW_MARKER), 1);
    assert_eq!(team.orchestrator.phase(), ProjectPhase::Complete);

    let task = team.store.get_task("task-3").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Blocked);
}

#[tokio::test]
async fn second_project_is_rejected_while_one_is_active() {
    let team = setup_team().await;

    let run = team
        .orchestrator
        .begin_project(ProjectBrief::new("first", "one"))
        .unwrap();
    let err = team
        .orchestrator
        .begin_project(ProjectBrief::new("second", "two"))
        .unwrap_err();
    assert!(matches!(err, AgentError::ProjectInProgress(name) if name == "first"));

    team.orchestrator.run_project(run).await.unwrap();
    team.orchestrator
        .start_project(ProjectBrief::new("second", "two"))
        .await
        .unwrap();
}

#[tokio::test]
async fn invalid_brief_is_rejected_before_anything_runs() {
    let team = setup_team().await;

    let err = team
        .orchestrator
        .start_project(ProjectBrief::new("../escape", "nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::InvalidProject(_)));
    assert_eq!(team.orchestrator.phase(), ProjectPhase::Idle);
    assert!(team.model.requests_for(AgentRole::ProjectManager).is_empty());
}

#[tokio::test]
async fn model_failure_fails_the_project() {
    let team = setup_team().await;
    script_plan(&team.model);
    team.model.fail(AgentRole::Designer);
    let mut rx = team.events.subscribe();

    let run = team
        .orchestrator
        .begin_project(ProjectBrief::new("broken", "build a todo app"))
        .unwrap();
    let project_id = run.project_id();
    let err = team.orchestrator.run_project(run).await.unwrap_err();

    assert!(matches!(err, AgentError::LlmError(_)));
    assert_eq!(team.orchestrator.phase(), ProjectPhase::Failed);
    assert!(team.model.requests_for(AgentRole::BackendDev).is_empty());

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(AgentEvent::Error { agent: None, .. })));
    assert!(!events.iter().any(|e| matches!(e, AgentEvent::ProjectComplete { .. })));

    let project = team.store.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Failed);
}

#[tokio::test]
async fn directive_goes_only_to_the_pm() {
    let team = setup_team().await;
    team.model
        .script(AgentRole::ProjectManager, vec![ModelResponse::text("On it, boss.")]);
    let mut rx = team.events.subscribe();

    let reply = team
        .orchestrator
        .send_directive("Add dark mode")
        .await
        .unwrap();

    assert_eq!(reply, "On it, boss.");
    assert_eq!(team.orchestrator.phase(), ProjectPhase::Idle);

    let events = drain(&mut rx);
    assert_eq!(
        events.first(),
        Some(&AgentEvent::BossCommand {
            text: "Add dark mode".to_string()
        })
    );
    assert!(events[1..]
        .iter()
        .all(|e| e.agent() == Some(AgentRole::ProjectManager)));

    for role in [
        AgentRole::FrontendDev,
        AgentRole::BackendDev,
        AgentRole::Designer,
        AgentRole::QaTester,
    ] {
        assert!(team.model.requests_for(role).is_empty());
    }
    let pm = team.model.requests_for(AgentRole::ProjectManager);
    assert!(pm[0].messages[0].text().contains("[BOSS COMMAND]: Add dark mode"));

    // The PM's answer reaches the event stream and the chat log
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Message {
            from: AgentRole::ProjectManager,
            to: MessageTarget::All,
            text: "On it, boss.".to_string(),
        })
    );
    let messages = team.orchestrator.recent_messages(10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to, MessageTarget::All);
    assert_eq!(messages[0].text, "On it, boss.");
}

#[tokio::test]
async fn nested_messages_are_deferred_not_lost() {
    let team = setup_team().await;
    // PM asks the designer something; the designer answers back to the PM,
    // whose loop is still running, so the answer is parked for the PM.
    team.model.script(
        AgentRole::ProjectManager,
        vec![
            ModelResponse::tool_calls(vec![(
                "m1",
                "send_message",
                json!({"to": "designer", "message": "Which palette?"}),
            )]),
            ModelResponse::text("Thanks."),
        ],
    );
    team.model.script(
        AgentRole::Designer,
        vec![
            ModelResponse::tool_calls(vec![(
                "m2",
                "send_message",
                json!({"to": "pm", "message": "Blue."}),
            )]),
            ModelResponse::text("Answered the PM."),
        ],
    );

    team.orchestrator.send_directive("Pick colours").await.unwrap();

    let pm = team.model.requests_for(AgentRole::ProjectManager);
    assert_eq!(pm.len(), 2);
    let after_tools = pm[1].messages.last().unwrap().text();
    assert!(after_tools.contains("[Message from designer]: Blue."));

    let messages = team.orchestrator.recent_messages(10).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].text, "Thanks.");
    assert_eq!(messages[1].text, "Blue.");
    assert_eq!(messages[2].text, "Which palette?");
}

#[tokio::test]
async fn reply_comes_from_the_addressed_agent_when_it_messages_onward() {
    let team = setup_team().await;
    team.model.script(
        AgentRole::BackendDev,
        vec![
            ModelResponse::tool_calls(vec![(
                "b1",
                "send_message",
                json!({"to": "designer", "message": "Which colour for buttons?"}),
            )]),
            ModelResponse::text("Got it."),
        ],
    );
    team.model.script(
        AgentRole::Designer,
        vec![
            ModelResponse::tool_calls(vec![(
                "d1",
                "send_message",
                json!({"to": "qa-tester", "message": "Check button contrast."}),
            )]),
            ModelResponse::text("Use blue."),
        ],
    );
    team.model
        .script(AgentRole::QaTester, vec![ModelResponse::text("Contrast noted.")]);

    let backend = team.orchestrator.agent(AgentRole::BackendDev).unwrap();
    backend.handle_message("Style the buttons").await.unwrap();

    // QA still got the designer's message
    assert_eq!(team.model.requests_for(AgentRole::QaTester).len(), 1);

    let requests = team.model.requests_for(AgentRole::BackendDev);
    assert_eq!(requests.len(), 2);
    let result = requests[1]
        .messages
        .last()
        .unwrap()
        .content
        .iter()
        .find_map(|block| match block {
            ContentBlock::ToolResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(result.contains("Message sent to designer. Reply: Use blue."), "{result}");
    assert!(!result.contains("Contrast noted."), "{result}");
}
