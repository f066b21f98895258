// HTTP and WebSocket handlers

pub mod events;
pub mod project;
pub mod state;
