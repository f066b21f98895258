// Agent system modules
//
// Role agents driven by a language model, the bus they talk over, and the
// orchestrator that runs a project through its phases.

pub mod errors;
pub mod events;
pub mod history;
pub mod llm;
pub mod messages;
pub mod orchestrator;
pub mod prompts;
pub mod state;
pub mod tools;
pub mod types;
pub mod worker;

// Re-export main types
pub use errors::{AgentError, AgentResult};
pub use events::{AgentEvent, EventSink};
pub use llm::{AnthropicClient, AnthropicSettings, LanguageModel};
pub use messages::{Delivery, MessageBus, MessageHandler};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use state::ProjectPhase;
pub use types::{AgentInfo, AgentStatus};
pub use worker::Agent;
