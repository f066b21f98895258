// Repository ports (interfaces implemented by infrastructure adapters)

pub mod task_store;

pub use task_store::{StoreError, StoreResult, TaskStore};
