//! Telegram Bot API front-end.
//!
//! Long-polls `getUpdates`, routes messages into the agent core, renders
//! approval requests as inline approve/deny keyboards, and pushes every
//! outbound API call through the send gate. Replies longer than the
//! configured limit are split on word boundaries.

use super::rate_limiter::{SendError, SendGate};
use super::traits::ChannelSink;
use crate::agent::{AgentCore, ChatTurnRequest};
use crate::config::TelegramConfig;
use crate::security::redact;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Overhead reserved for continuation markers when splitting long messages.
const CONTINUATION_OVERHEAD: usize = 16;

pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
    max_message_chars: usize,
    gate: SendGate,
    core: Arc<AgentCore>,
}

/// Split a message into chunks under `limit` characters, preferring newline
/// and space boundaries over hard cuts.
fn split_message(message: &str, limit: usize) -> Vec<String> {
    if message.chars().count() <= limit {
        return vec![message.to_string()];
    }

    let chunk_limit = limit.saturating_sub(CONTINUATION_OVERHEAD).max(1);
    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        if remaining.chars().count() <= limit {
            chunks.push(remaining.to_string());
            break;
        }

        let hard_split = remaining
            .char_indices()
            .nth(chunk_limit)
            .map_or(remaining.len(), |(idx, _)| idx);

        let search_area = &remaining[..hard_split];
        let chunk_end = if let Some(pos) = search_area.rfind('\n') {
            if search_area[..pos].chars().count() >= chunk_limit / 2 {
                pos + 1
            } else {
                search_area.rfind(' ').map_or(hard_split, |p| p + 1)
            }
        } else if let Some(pos) = search_area.rfind(' ') {
            pos + 1
        } else {
            hard_split
        };

        chunks.push(remaining[..chunk_end].to_string());
        remaining = &remaining[chunk_end..];
    }

    chunks
}

/// Map a Telegram API response to the send gate's error surface.
fn check_telegram_response(status: reqwest::StatusCode, body: &Value) -> Result<(), SendError> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }

    if let Some(retry_after) = body
        .pointer("/parameters/retry_after")
        .and_then(Value::as_u64)
    {
        return Err(SendError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(SendError::Other(anyhow::anyhow!(
        "telegram API error ({status}): {description}"
    )))
}

impl TelegramChannel {
    pub fn new(
        config: &TelegramConfig,
        max_message_chars: usize,
        gate: SendGate,
        core: Arc<AgentCore>,
    ) -> anyhow::Result<Self> {
        let token = config
            .bot_token
            .clone()
            .context("telegram bot token is not configured")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()
            .context("failed to build telegram HTTP client")?;

        info!(token = %redact(&token), "telegram channel configured");

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            max_message_chars,
            gate,
            core,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call_api(&self, method: &str, payload: &Value) -> Result<Value, SendError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| SendError::Other(anyhow::anyhow!("telegram request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| SendError::Other(anyhow::anyhow!("telegram returned non-JSON: {e}")))?;

        check_telegram_response(status, &body)?;
        Ok(body)
    }

    /// Send one API call through the gate.
    async fn gated_call(&self, chat_id: i64, method: &str, payload: Value) -> Option<Value> {
        self.gate
            .send(chat_id, || self.call_api(method, &payload))
            .await
    }

    /// Long-poll loop. Runs until the process stops; transport errors back
    /// off and retry.
    pub async fn listen(&self) -> anyhow::Result<()> {
        info!("telegram channel listening");
        let mut offset: i64 = 0;

        loop {
            let payload = json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            });

            let body = match self.call_api("getUpdates", &payload).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("getUpdates failed: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            let updates = body
                .get("result")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for update in updates {
                if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                    offset = offset.max(update_id + 1);
                }
                self.handle_update(&update).await;
            }
        }
    }

    async fn handle_update(&self, update: &Value) {
        if let Some(callback) = update.get("callback_query") {
            self.handle_callback(callback).await;
            return;
        }

        let Some(message) = update.get("message") else {
            return;
        };
        let Some(text) = message.get("text").and_then(Value::as_str) else {
            return;
        };
        let Some(user_id) = message.pointer("/from/id").and_then(Value::as_i64) else {
            return;
        };
        let Some(chat_id) = message.pointer("/chat/id").and_then(Value::as_i64) else {
            return;
        };
        let username = message
            .pointer("/from/username")
            .and_then(Value::as_str)
            .unwrap_or("anonymous")
            .to_string();
        let chat_type = message
            .pointer("/chat/type")
            .and_then(Value::as_str)
            .unwrap_or("private")
            .to_string();

        debug!(user_id, chat_id, "telegram message received");

        match text.trim() {
            "/start" => {
                let _ = self
                    .send_text(chat_id, "Hi. I run commands in your sandbox. Ask me anything.")
                    .await;
            }
            "/clear" => {
                self.core.clear_session(user_id);
                let _ = self.send_text(chat_id, "Session cleared.").await;
            }
            "/status" => {
                let _ = self.send_text(chat_id, &self.core.status_summary()).await;
            }
            _ => {
                let request = ChatTurnRequest {
                    user_id,
                    chat_id,
                    message: text.to_string(),
                    username,
                    source: "telegram".into(),
                    chat_type,
                };
                let reply = match self.core.handle_chat(&request).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(user_id, "turn failed: {e:#}");
                        "Something went wrong on my side. Try again.".to_string()
                    }
                };
                let _ = self.send_text(chat_id, &reply).await;
            }
        }
    }

    async fn handle_callback(&self, callback: &Value) {
        let Some(data) = callback.get("data").and_then(Value::as_str) else {
            return;
        };
        let callback_id = callback.get("id").and_then(Value::as_str).unwrap_or("");
        let chat_id = callback
            .pointer("/message/chat/id")
            .and_then(Value::as_i64)
            .unwrap_or_default();

        let result = if let Some(id) = data.strip_prefix("approve:") {
            Some(self.core.approve(id).await)
        } else if let Some(id) = data.strip_prefix("deny:") {
            Some(self.core.deny(id))
        } else {
            None
        };

        // Acknowledge the tap so the button stops spinning.
        let ack = json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call_api("answerCallbackQuery", &ack).await {
            debug!("answerCallbackQuery failed: {e}");
        }

        if let (Some(text), true) = (result, chat_id != 0) {
            let _ = self.send_text(chat_id, &text).await;
        }
    }
}

#[async_trait]
impl ChannelSink for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        for chunk in split_message(text, self.max_message_chars) {
            let payload = json!({ "chat_id": chat_id, "text": chunk });
            if self
                .gated_call(chat_id, "sendMessage", payload)
                .await
                .is_none()
            {
                anyhow::bail!("failed to deliver message to chat {chat_id}");
            }
        }
        Ok(())
    }

    async fn show_approval(
        &self,
        chat_id: i64,
        command_id: &str,
        command: &str,
        reason: &str,
    ) -> anyhow::Result<()> {
        let text = format!(
            "Approval required ({reason}):\n\n{command}\n\nExpires in 5 minutes."
        );
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": {
                "inline_keyboard": [[
                    { "text": "✅ Approve", "callback_data": format!("approve:{command_id}") },
                    { "text": "❌ Deny", "callback_data": format!("deny:{command_id}") },
                ]]
            }
        });

        if self
            .gated_call(chat_id, "sendMessage", payload)
            .await
            .is_none()
        {
            anyhow::bail!("failed to deliver approval prompt to chat {chat_id}");
        }
        Ok(())
    }
}
