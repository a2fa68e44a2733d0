use super::normalize_tool_path;
use super::traits::{Tool, ToolContext, ToolResult};
use crate::security::PathGuard;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct ListDirectoryTool {
    paths: Arc<PathGuard>,
}

impl ListDirectoryTool {
    pub fn new(paths: Arc<PathGuard>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the contents of a workspace directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Defaults to the working directory" }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw = args
            .get("path")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or(".");
        let path = normalize_tool_path(raw, ctx);

        if let Some(reason) = self.paths.check_list(&path, &ctx.workspace).reason() {
            return Ok(ToolResult::fail(reason));
        }
        if !path.is_dir() {
            return Ok(ToolResult::fail(format!("Not a directory: {}", path.display())));
        }

        info!(user_id = ctx.user_id, path = %path.display(), "listing directory");

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(reader) => reader,
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                entries.push(format!("{name}/"));
            } else {
                let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                entries.push(format!("{name}  ({size} bytes)"));
            }
        }
        entries.sort();

        if entries.is_empty() {
            Ok(ToolResult::ok("(empty directory)"))
        } else {
            Ok(ToolResult::ok(entries.join("\n")))
        }
    }
}
