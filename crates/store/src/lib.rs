// Persistent document storage

pub mod sqlite;

pub use sqlite::{CollectionStats, SqliteStore};
