// Prompt templates for agent instructions
//
// Role system prompts live in `role_profile`; the orchestrator's per-phase
// instructions live in `library`. Templates are versioned so a changed prompt
// is visible in logs.

use crate::domain::role::AgentRole;

/// A named instruction with `{{var}}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub version: &'static str,
    pub template: &'static str,
}

impl PromptTemplate {
    /// Substitute every `{{key}}` with its value
    ///
    /// Placeholders without a value are left as they are.
    ///
    /// # Example
    /// ```
    /// use agency_api::agents::prompts::PromptTemplate;
    ///
    /// let t = PromptTemplate { name: "greet", version: "1.0.0", template: "Hi {{who}}!" };
    /// assert_eq!(t.render(&[("who", "Sam")]), "Hi Sam!");
    /// ```
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = after[..end].trim();
                    match variables.iter().find(|(name, _)| *name == key) {
                        Some((_, value)) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Display name, home location and system prompt of a role
#[derive(Debug, Clone, Copy)]
pub struct RoleProfile {
    pub name: &'static str,
    pub desk: &'static str,
    pub prompt: &'static str,
}

pub fn role_profile(role: AgentRole) -> RoleProfile {
    match role {
        AgentRole::ProjectManager => RoleProfile {
            name: "Alex (PM)",
            desk: "pm-desk",
            prompt: PM_PROMPT,
        },
        AgentRole::FrontendDev => RoleProfile {
            name: "Sam (Frontend)",
            desk: "frontend-dev-desk",
            prompt: FRONTEND_PROMPT,
        },
        AgentRole::BackendDev => RoleProfile {
            name: "Jordan (Backend)",
            desk: "backend-dev-desk",
            prompt: BACKEND_PROMPT,
        },
        AgentRole::Designer => RoleProfile {
            name: "Riley (Designer)",
            desk: "designer-desk",
            prompt: DESIGNER_PROMPT,
        },
        AgentRole::QaTester => RoleProfile {
            name: "Casey (QA)",
            desk: "qa-tester-desk",
            prompt: QA_PROMPT,
        },
    }
}

const PM_PROMPT: &str = "You are Alex, project manager of a small software agency staffed by AI agents.

You turn briefs from the boss into a plan the team can execute, keep the task board current and keep people talking to each other.

Team:
- frontend-dev: UI components, pages, styling
- backend-dev: APIs, persistence, server logic, project scaffolding
- designer: layout, component hierarchy, visual language (writes design-spec.md)
- qa-tester: reviews the code, runs it, reports bugs

Create every task with update_task and fill in all fields: taskId (task-1, task-2, ...), status \"pending\", a short title, a description concrete enough to build from, the assignee role, and a priority (higher runs first).

Use send_message to brief teammates; messages reach them directly. Decide the tech stack up front and keep it consistent.";

const FRONTEND_PROMPT: &str = "You are Sam, senior frontend developer at a software agency staffed by AI agents.

You build the user interface: components, pages, layout, client state and styling. Prefer modern React with TypeScript and function components, write accessible markup, and follow the designer's spec when one exists.

Check existing files with read_file and list_files before changing them, write source with write_file, agree API contracts with backend-dev over send_message, and keep your tasks' status current with update_task.";

const BACKEND_PROMPT: &str = "You are Jordan, senior backend developer at a software agency staffed by AI agents.

You own the server side: project scaffolding and package.json, API routes, data models, validation and error handling.

Write source with write_file, use run_command for setup steps such as installing packages, agree API contracts with frontend-dev over send_message, and keep your tasks' status current with update_task.";

const DESIGNER_PROMPT: &str = "You are Riley, UI/UX designer at a software agency staffed by AI agents.

You decide how the product looks and flows: component hierarchy, layout, colour palette, typography, spacing and interaction patterns. Keep designs accessible and responsive.

Write your decisions to design-spec.md with write_file, including concrete styling guidance a developer can follow, and send the key points to frontend-dev with send_message.";

const QA_PROMPT: &str = "You are Casey, QA engineer at a software agency staffed by AI agents.

You review everything the team produced: look for syntax errors, missing imports, broken wiring between frontend and backend, and wrong or missing dependencies. Try to run the project or its tests with run_command when that is possible.

Use list_files and read_file to inspect the code. Report each problem to the developer responsible with send_message, being specific about file and fix. Mark tasks that cannot pass review as \"blocked\" with update_task, and write your findings to review-notes.md.";

pub mod library {
    use super::PromptTemplate;

    pub fn planning() -> PromptTemplate {
        PromptTemplate {
            name: "planning",
            version: "1.0.0",
            template: "New project brief from the boss:\n\n\"{{description}}\"\n\n\
                       Project name: {{project_name}}\n\n\
                       Break the brief into concrete tasks and put each on the board with update_task \
                       (ids task-1, task-2, ...), assigned to the right role:\n\
                       - designer: UI/UX structure and design-spec.md\n\
                       - backend-dev: APIs, data, server logic, project setup\n\
                       - frontend-dev: components, pages, styling\n\
                       - qa-tester: testing and review\n\n\
                       When the board is complete, send each teammate a short summary of their work.",
        }
    }

    pub fn task_assignment() -> PromptTemplate {
        PromptTemplate {
            name: "task_assignment",
            version: "1.0.0",
            template: "You have been assigned a task.\n\n\
                       Task ID: {{task_id}}\n\
                       Title: {{title}}\n\
                       Priority: {{priority}}\n\
                       Description: {{description}}\n\n\
                       Set it to in_progress with update_task, do the work with your tools, \
                       then set it to done (or blocked if you cannot finish it).",
        }
    }

    pub fn build_fallback() -> PromptTemplate {
        PromptTemplate {
            name: "build_fallback",
            version: "1.0.0",
            template: "You're working on \"{{project_name}}\": {{description}}\n\n\
                       No tasks were assigned to you on the board. Build the {{area}} part of the \
                       project anyway, creating every file it needs.",
        }
    }

    pub fn design_context() -> PromptTemplate {
        PromptTemplate {
            name: "design_context",
            version: "1.0.0",
            template: "The designer's spec ({{file}}) for this project follows. Follow it while you build.\n\n{{content}}",
        }
    }

    pub fn review_all() -> PromptTemplate {
        PromptTemplate {
            name: "review_all",
            version: "1.0.0",
            template: "The team has finished building \"{{project_name}}\". Review the project:\n\
                       1. List all files with list_files\n\
                       2. Read the key files and look for problems\n\
                       3. If there is a package.json, try to run the project or its tests\n\
                       4. Send each bug to the developer responsible\n\
                       5. Mark tasks that fail review as blocked\n\
                       6. Write your findings to review-notes.md",
        }
    }

    pub fn fix_blocked() -> PromptTemplate {
        PromptTemplate {
            name: "fix_blocked",
            version: "1.0.0",
            template: "Task {{task_id}} (\"{{title}}\") is blocked after review.\n\n\
                       Description: {{description}}\n\n\
                       Read review-notes.md and the relevant files, fix the problems, \
                       then set the task back to done with update_task.",
        }
    }

    pub fn re_review() -> PromptTemplate {
        PromptTemplate {
            name: "re_review",
            version: "1.0.0",
            template: "Fixes were made for these blocked tasks: {{task_ids}}.\n\n\
                       Check the changes once more, update review-notes.md, and set each task to done \
                       if it now passes. This is the final review.",
        }
    }

    pub fn directive() -> PromptTemplate {
        PromptTemplate {
            name: "directive",
            version: "1.0.0",
            template: "[BOSS COMMAND]: {{text}}\n\n\
                       The boss has given a new directive. Coordinate the team to handle it: \
                       create tasks with update_task where needed and message the people involved.",
        }
    }
}
