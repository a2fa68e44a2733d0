//! Pending-approval store for dangerous commands.
//!
//! When the command guard returns `Dangerous`, the command is parked here
//! until a human approves or denies it out-of-band. Records are consume-once
//! (atomic read-and-remove, so a double-clicked approve button executes at
//! most once) and expire after the configured TTL. An expired record is gone:
//! `consume` returns `None` and the command never executes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A dangerous command awaiting a human decision.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// Opaque token surfaced to the approval UI.
    pub id: String,
    pub session_id: String,
    pub chat_id: i64,
    pub command: String,
    pub cwd: PathBuf,
    /// Classifier reason shown next to the approve/deny buttons.
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    record: PendingCommand,
    deadline: Instant,
}

/// In-memory approval registry with TTL eviction.
///
/// All state lives behind one mutex; every public method is a short critical
/// section with no await points inside.
#[derive(Debug)]
pub struct ApprovalStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

/// Opaque id: millisecond timestamp plus a random UUID.
/// Not guessable across sessions, unique within one.
fn new_command_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

impl ApprovalStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a pending command and return its id.
    pub fn store(
        &self,
        session_id: &str,
        chat_id: i64,
        command: &str,
        cwd: PathBuf,
        reason: &str,
    ) -> String {
        let id = new_command_id();
        let record = PendingCommand {
            id: id.clone(),
            session_id: session_id.to_string(),
            chat_id,
            command: command.to_string(),
            cwd,
            reason: reason.to_string(),
            created_at: Utc::now(),
        };
        let entry = Entry {
            record,
            deadline: Instant::now() + self.ttl,
        };
        self.entries.lock().insert(id.clone(), entry);
        id
    }

    /// Atomic read-and-remove. Returns `None` for unknown or expired ids;
    /// concurrent callers for the same id get at most one `Some`.
    pub fn consume(&self, id: &str) -> Option<PendingCommand> {
        let mut entries = self.entries.lock();
        let entry = entries.remove(id)?;
        if Instant::now() >= entry.deadline {
            return None;
        }
        Some(entry.record)
    }

    /// Snapshot of live records for one session.
    pub fn list_by_session(&self, session_id: &str) -> Vec<PendingCommand> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.deadline > now);
        let mut records: Vec<PendingCommand> = entries
            .values()
            .filter(|e| e.record.session_id == session_id)
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Remove a record without executing it. Returns whether it existed.
    pub fn cancel(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Drop every pending record for a session (used by `/clear`).
    pub fn clear_session(&self, session_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.record.session_id != session_id);
        before - entries.len()
    }

    /// Evict expired records. Called opportunistically; expiry is also
    /// enforced lazily in `consume` and `list_by_session`.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.deadline > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
