use super::normalize_tool_path;
use super::traits::{Tool, ToolContext, ToolResult};
use crate::security::PathGuard;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct WriteFileTool {
    paths: Arc<PathGuard>,
}

impl WriteFileTool {
    pub fn new(paths: Arc<PathGuard>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating directories as needed"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
        let Some(raw) = args.get("path").and_then(|v| v.as_str()).filter(|p| !p.is_empty())
        else {
            return Ok(ToolResult::fail("Missing 'path' parameter"));
        };
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        let path = normalize_tool_path(raw, ctx);

        if let Some(reason) = self.paths.check_write(&path, &ctx.workspace).reason() {
            return Ok(ToolResult::fail(reason));
        }

        info!(user_id = ctx.user_id, path = %path.display(), bytes = content.len(), "writing file");

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolResult::fail(e.to_string()));
            }
        }
        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Written {} bytes to {raw}",
                content.len()
            ))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}
