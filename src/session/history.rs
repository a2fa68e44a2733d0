//! Bounded per-user conversation history.
//!
//! Kept in memory only: the agent remembers the last `max_exchanges`
//! user/assistant pairs per user and nothing else. `/clear` wipes it together
//! with the user's pending approvals.

use crate::providers::traits::ChatMessage;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
pub struct HistoryStore {
    max_exchanges: usize,
    conversations: Mutex<HashMap<i64, Vec<ChatMessage>>>,
}

impl HistoryStore {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            max_exchanges: max_exchanges.max(1),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Record one completed exchange and trim to the retention window.
    pub fn record_exchange(&self, user_id: i64, user_text: &str, assistant_text: &str) {
        let mut conversations = self.conversations.lock();
        let history = conversations.entry(user_id).or_default();
        history.push(ChatMessage::user(user_text));
        history.push(ChatMessage::assistant(assistant_text));

        let max_messages = self.max_exchanges * 2;
        if history.len() > max_messages {
            let excess = history.len() - max_messages;
            history.drain(..excess);
        }
    }

    /// Snapshot of the user's retained messages, oldest first.
    pub fn messages(&self, user_id: i64) -> Vec<ChatMessage> {
        self.conversations
            .lock()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a user's history. Returns whether anything was stored.
    pub fn clear(&self, user_id: i64) -> bool {
        self.conversations.lock().remove(&user_id).is_some()
    }
}
