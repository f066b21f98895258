// Domain layer module exports
// Records and ports for the task board; no orchestration logic here

pub mod message;
pub mod project;
pub mod repositories;
pub mod role;
pub mod task;

pub use role::AgentRole;
