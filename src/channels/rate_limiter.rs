//! Outbound send gate.
//!
//! Telegram throttles bots globally and per group chat, so every outbound
//! API call funnels through one process-wide queue: an async mutex held from
//! the pre-send sleep until the send attempt returns. Consecutive sends
//! observe a minimum global interval, group chats (negative chat ids in the
//! Telegram convention) observe a longer per-chat interval, and provider 429s
//! are retried with the advertised retry-after plus a safety buffer.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Error surface a send attempt reports to the gate.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Provider-side rate limit with its advertised retry delay.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    /// Anything else. Logged once, not retried.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
struct SendState {
    global_last: Option<Instant>,
    group_last: HashMap<i64, Instant>,
}

/// Process-wide outbound rate limiter.
#[derive(Debug)]
pub struct SendGate {
    global_min: Duration,
    group_min: Duration,
    max_retries: u32,
    retry_buffer: Duration,
    state: Mutex<SendState>,
}

/// Telegram convention: group and channel chats carry negative ids.
pub fn is_group_chat(chat_id: i64) -> bool {
    chat_id < 0
}

impl SendGate {
    pub fn new(
        global_min: Duration,
        group_min: Duration,
        max_retries: u32,
        retry_buffer: Duration,
    ) -> Self {
        Self {
            global_min,
            group_min,
            max_retries: max_retries.max(1),
            retry_buffer,
            state: Mutex::new(SendState::default()),
        }
    }

    /// Run one rate-limited send. Returns the provider response, or `None`
    /// after retry exhaustion or a non-retryable error.
    ///
    /// The internal lock is held across the interval sleeps and the attempt
    /// itself, so sends are strictly serialized process-wide and per-chat
    /// ordering follows call order.
    pub async fn send<T, F, Fut>(&self, chat_id: i64, mut send_fn: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let mut state = self.state.lock().await;

        for attempt in 1..=self.max_retries {
            if let Some(last) = state.global_last {
                let elapsed = last.elapsed();
                if elapsed < self.global_min {
                    tokio::time::sleep(self.global_min - elapsed).await;
                }
            }

            if is_group_chat(chat_id) {
                if let Some(last) = state.group_last.get(&chat_id).copied() {
                    let elapsed = last.elapsed();
                    if elapsed < self.group_min {
                        tokio::time::sleep(self.group_min - elapsed).await;
                    }
                }
                state.group_last.insert(chat_id, Instant::now());
            }

            state.global_last = Some(Instant::now());

            match send_fn().await {
                Ok(response) => return Some(response),
                Err(SendError::RateLimited { retry_after }) => {
                    warn!(
                        chat_id,
                        attempt,
                        max = self.max_retries,
                        "provider rate limit, backing off {:?}",
                        retry_after + self.retry_buffer
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(retry_after + self.retry_buffer).await;
                    }
                }
                Err(SendError::Other(e)) => {
                    warn!(chat_id, "send failed: {e:#}");
                    return None;
                }
            }
        }

        None
    }
}
