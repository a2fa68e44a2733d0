//! OpenAI-compatible chat-completions client against the key-holding proxy.
//!
//! The proxy substitutes the real API key and upstream base URL; this client
//! never sees secret material, so requests carry no Authorization header.

use super::traits::{
    ChatRequest, ChatResponse, ConversationMessage, Provider, ToolCall,
};
use crate::tools::ToolSpec;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct ProxyProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl ProxyProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f64,
        deadline: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .context("failed to build proxy HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

/// Flatten conversation messages into the chat-completions wire format.
fn wire_messages(messages: &[ConversationMessage]) -> Vec<Value> {
    let mut wire = Vec::new();
    for message in messages {
        match message {
            ConversationMessage::Chat(m) => {
                wire.push(json!({ "role": m.role, "content": m.content }));
            }
            ConversationMessage::AssistantToolCalls { text, tool_calls } => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments },
                        })
                    })
                    .collect();
                wire.push(json!({
                    "role": "assistant",
                    "content": text.clone().unwrap_or_default(),
                    "tool_calls": calls,
                }));
            }
            ConversationMessage::ToolResults(results) => {
                for result in results {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": result.tool_call_id,
                        "content": result.content,
                    }));
                }
            }
        }
    }
    wire
}

fn wire_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            })
        })
        .collect()
}

/// Parse a chat-completions response body into text plus tool calls.
fn parse_chat_response(body: &Value) -> anyhow::Result<ChatResponse> {
    let message = body
        .pointer("/choices/0/message")
        .context("response has no choices[0].message")?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    Some(ToolCall {
                        id: call.get("id").and_then(Value::as_str).unwrap_or("").to_string(),
                        name: function.get("name").and_then(Value::as_str)?.to_string(),
                        arguments: function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .unwrap_or("{}")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatResponse { text, tool_calls })
}

#[async_trait]
impl Provider for ProxyProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": wire_messages(request.messages),
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(wire_tools(request.tools));
        }

        debug!(model = %self.model, messages = request.messages.len(), "proxy chat request");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .context("proxy request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("proxy returned non-JSON body")?;

        if !status.is_success() {
            let detail = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("proxy error ({status}): {detail}");
        }

        parse_chat_response(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::{ChatMessage, ToolResultMessage};

    #[test]
    fn wire_messages_flattens_tool_interactions() {
        let messages = vec![
            ConversationMessage::Chat(ChatMessage::system("be careful")),
            ConversationMessage::Chat(ChatMessage::user("list files")),
            ConversationMessage::AssistantToolCalls {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "run_command".into(),
                    arguments: r#"{"command":"ls"}"#.into(),
                }],
            },
            ConversationMessage::ToolResults(vec![ToolResultMessage {
                tool_call_id: "call_1".into(),
                content: "a.txt".into(),
            }]),
        ];

        let wire = wire_messages(&messages);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "run_command");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_text_response() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello there" } }]
        });
        let parsed = parse_chat_response(&body).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("hello there"));
        assert!(!parsed.has_tool_calls());
    }

    #[test]
    fn parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": { "name": "read_file", "arguments": r#"{"path":"x"}"# }
                    }]
                }
            }]
        });
        let parsed = parse_chat_response(&body).unwrap();
        assert!(parsed.text.is_none());
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "read_file");
        assert_eq!(parsed.tool_calls[0].arguments, r#"{"path":"x"}"#);
    }

    #[test]
    fn parse_rejects_empty_choices() {
        let body = json!({ "choices": [] });
        assert!(parse_chat_response(&body).is_err());
    }

    #[test]
    fn wire_tools_shape() {
        let tools = vec![ToolSpec {
            name: "run_command".into(),
            description: "Execute a shell command".into(),
            parameters: json!({"type": "object"}),
        }];
        let wire = wire_tools(&tools);
        assert_eq!(wire[0]["type"], "function");
        assert_eq!(wire[0]["function"]["name"], "run_command");
    }
}
