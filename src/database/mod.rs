/*!
 * SQLite persistence for imported files, dialogue items and the
 * translation memory.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{FileSummary, ItemUpdate, TmStats, TranslationMemoryEntry};
pub use repository::Repository;
