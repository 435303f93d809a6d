// ABOUTME: Persistence layer for inkwell: conversation log, shared project data, and sessions.
// ABOUTME: Provides the CollaborationStore trait with in-memory and SQLite backends, plus the config file.

pub mod config_file;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config_file::{ConfigFileError, FileConfigStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{CollaborationStore, StoreError};
