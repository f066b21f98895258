// Infrastructure layer module
// Contains the SQLite adapter behind the task store port
// Follows Hexagonal Architecture

pub mod repositories;
