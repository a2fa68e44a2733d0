use super::normalize_tool_path;
use super::traits::{Tool, ToolContext, ToolResult};
use crate::security::PathGuard;
use crate::util::truncate_with_ellipsis;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct EditFileTool {
    paths: Arc<PathGuard>,
}

impl EditFileTool {
    pub fn new(paths: Arc<PathGuard>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace the first occurrence of old_text with new_text in a file"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "old_text": { "type": "string" },
                "new_text": { "type": "string" }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
        let Some(raw) = args.get("path").and_then(|v| v.as_str()).filter(|p| !p.is_empty())
        else {
            return Ok(ToolResult::fail("Missing 'path' parameter"));
        };
        let old_text = args.get("old_text").and_then(|v| v.as_str()).unwrap_or("");
        let new_text = args.get("new_text").and_then(|v| v.as_str()).unwrap_or("");
        if old_text.is_empty() {
            return Ok(ToolResult::fail("Missing 'old_text' parameter"));
        }

        let path = normalize_tool_path(raw, ctx);
        if let Some(reason) = self.paths.check_write(&path, &ctx.workspace).reason() {
            return Ok(ToolResult::fail(reason));
        }
        if !path.exists() {
            return Ok(ToolResult::fail(format!("File not found: {}", path.display())));
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };

        if !content.contains(old_text) {
            let preview = truncate_with_ellipsis(&content, 2000);
            return Ok(ToolResult::fail(format!(
                "old_text not found.\n\nPreview:\n{preview}"
            )));
        }

        info!(user_id = ctx.user_id, path = %path.display(), "editing file");

        let updated = content.replacen(old_text, new_text, 1);
        match tokio::fs::write(&path, updated).await {
            Ok(()) => Ok(ToolResult::ok(format!("Edited {raw}"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}
