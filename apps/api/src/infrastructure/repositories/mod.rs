// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod sqlite_task_store;

pub use sqlite_task_store::SqliteTaskStore;
