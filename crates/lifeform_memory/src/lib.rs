pub mod sqlite;

pub use sqlite::{HistoryEntry, SqliteStore, UnitOfWork, LIFEFORM_STATE_ID};
