use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Tool definition advertised to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// Structured result of one tool invocation.
///
/// Results are values, never errors: a failing tool reports `success: false`
/// and the LLM loop decides whether to retry, adapt, or apologize.
/// `approval_required` combined with `success: false` tells the loop to stop
/// and await the human decision.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub approval_required: bool,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn approval_pending(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            approval_required: true,
            ..Self::default()
        }
    }

    /// Serialize for the LLM tool-result message.
    pub fn to_llm_payload(&self) -> String {
        let mut payload = serde_json::Map::new();
        payload.insert("success".into(), Value::Bool(self.success));
        if !self.output.is_empty() {
            payload.insert("output".into(), Value::String(self.output.clone()));
        }
        if let Some(error) = &self.error {
            payload.insert("error".into(), Value::String(error.clone()));
        }
        if self.approval_required {
            payload.insert("approval_required".into(), Value::Bool(true));
        }
        Value::Object(payload).to_string()
    }
}

/// Per-turn execution context handed to every tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: i64,
    pub chat_id: i64,
    pub session_id: String,
    /// The user's workspace root; all file access is confined beneath it.
    pub workspace: PathBuf,
    /// Current working directory for relative paths and shell execution.
    pub cwd: PathBuf,
}

/// An agent-callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<ToolResult>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
