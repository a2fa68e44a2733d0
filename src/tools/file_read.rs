use super::normalize_tool_path;
use super::traits::{Tool, ToolContext, ToolResult};
use crate::security::PathGuard;
use crate::util::cap_output_bytes;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Maximum bytes returned from a single read.
const MAX_READ_BYTES: usize = 100_000;

pub struct ReadFileTool {
    paths: Arc<PathGuard>,
}

impl ReadFileTool {
    pub fn new(paths: Arc<PathGuard>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the workspace, optionally a line range"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "offset": { "type": "integer", "description": "1-based first line" },
                "limit": { "type": "integer", "description": "Number of lines" }
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

        if let Some(reason) = self.paths.check_read(&path, &ctx.workspace).reason() {
            return Ok(ToolResult::fail(reason));
        }

        if !path.exists() {
            return Ok(ToolResult::fail(format!("File not found: {}", path.display())));
        }

        info!(user_id = ctx.user_id, path = %path.display(), "reading file");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };

        let offset = args.get("offset").and_then(|v| v.as_u64()).map(|v| v as usize);
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let content = if offset.is_some() || limit.is_some() {
            let lines: Vec<&str> = content.split('\n').collect();
            let start = offset.unwrap_or(1).saturating_sub(1).min(lines.len());
            let end = limit.map_or(lines.len(), |l| (start + l).min(lines.len()));
            lines[start..end]
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{}|{line}", start + i + 1))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            content
        };

        let content = cap_output_bytes(&content, MAX_READ_BYTES);
        if content.is_empty() {
            Ok(ToolResult::ok("(empty file)"))
        } else {
            Ok(ToolResult::ok(content))
        }
    }
}
