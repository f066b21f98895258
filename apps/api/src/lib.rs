//! Dev Agency API Library
//!
//! A team of LLM-backed role agents (PM, frontend, backend, designer, QA)
//! that turns a project brief into source files. Provides the agent loop,
//! the message bus, the task board store, the orchestrator's phase script
//! and the HTTP/WebSocket adapter around them.

pub mod agents;
pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
