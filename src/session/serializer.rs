//! Per-user turn serialization and global capacity control.
//!
//! One in-flight turn per user: turns for the same user queue FIFO behind a
//! per-user async mutex (tokio mutexes grant in arrival order), turns for
//! distinct users run in parallel up to `max_concurrent` active users. There
//! is no queueing beyond the per-user lock: when capacity is exhausted the
//! caller refuses the turn with a transient "busy" signal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Gate over turn admission and per-user ordering.
#[derive(Debug)]
pub struct TurnGate {
    max_concurrent: usize,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    /// In-flight turn count per user. A user with queued turns stays active
    /// until the last one finishes.
    active: Mutex<HashMap<i64, usize>>,
}

/// RAII handle for one admitted turn. Dropping it releases the user's slot,
/// including on cancellation or deadline abort.
#[derive(Debug)]
pub struct ActiveTurn<'a> {
    gate: &'a TurnGate,
    user_id: i64,
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.gate.mark_inactive(self.user_id);
    }
}

impl TurnGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            locks: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// True when the user is already active, or a fresh slot is available.
    pub fn can_accept(&self, user_id: i64) -> bool {
        let active = self.active.lock();
        active.contains_key(&user_id) || active.len() < self.max_concurrent
    }

    /// Admit a turn. Returns `None` when capacity is exhausted; the caller
    /// declines with a transient busy signal instead of queueing.
    pub fn activate(&self, user_id: i64) -> Option<ActiveTurn<'_>> {
        let mut active = self.active.lock();
        if !active.contains_key(&user_id) && active.len() >= self.max_concurrent {
            return None;
        }
        *active.entry(user_id).or_insert(0) += 1;
        Some(ActiveTurn {
            gate: self,
            user_id,
        })
    }

    pub fn mark_inactive(&self, user_id: i64) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&user_id) {
            *count -= 1;
            if *count == 0 {
                active.remove(&user_id);
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn user_lock(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(user_id).or_default())
    }

    /// Run `turn` while holding the user's lock. Waiters are granted the lock
    /// in FIFO order. Dropping the returned future at a suspension point
    /// releases the lock and lets the next queued turn proceed.
    pub async fn with_user_lock<F, T>(&self, user_id: i64, turn: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        turn.await
    }
}
