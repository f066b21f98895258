// Task board domain module
// Contains the task record, its status and the partial-update type

#![allow(clippy::module_inception)]

pub mod task;
pub mod value_objects;

// Re-export main types for convenience
pub use task::{Task, TaskPatch};
pub use value_objects::TaskStatus;
