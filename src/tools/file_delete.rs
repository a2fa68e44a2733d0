use super::normalize_tool_path;
use super::traits::{Tool, ToolContext, ToolResult};
use crate::security::PathGuard;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct DeleteFileTool {
    paths: Arc<PathGuard>,
}

impl DeleteFileTool {
    pub fn new(paths: Arc<PathGuard>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a single file from the workspace"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
        let Some(raw) = args.get("path").and_then(|v| v.as_str()).filter(|p| !p.is_empty())
        else {
            return Ok(ToolResult::fail("Missing 'path' parameter"));
        };
        let path = normalize_tool_path(raw, ctx);

        if let Some(reason) = self.paths.check_write(&path, &ctx.workspace).reason() {
            return Ok(ToolResult::fail(reason));
        }
        if !path.exists() {
            return Ok(ToolResult::fail(format!("File not found: {}", path.display())));
        }

        info!(user_id = ctx.user_id, path = %path.display(), "deleting file");

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(ToolResult::ok(format!("Deleted: {raw}"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}
