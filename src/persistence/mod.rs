//! Durable state for the spike engine: episodes and daily report counts.

pub mod error;
pub mod sqlite;
pub use sqlite::SqliteStateRepository;
pub mod traits;
