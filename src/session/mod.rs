//! Per-user session state: turn serialization and conversation history.

pub mod history;
pub mod serializer;

pub use history::HistoryStore;
pub use serializer::TurnGate;
