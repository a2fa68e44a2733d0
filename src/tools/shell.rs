//! Shell command tool: classify, then execute or park for approval.

use super::traits::{Tool, ToolContext, ToolResult};
use crate::approval::ApprovalStore;
use crate::channels::traits::ChannelBridge;
use crate::runtime::SandboxRunner;
use crate::security::{sanitize_output, CommandDecision, CommandGuard};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RunCommandTool {
    guard: Arc<CommandGuard>,
    approvals: Arc<ApprovalStore>,
    bridge: Arc<ChannelBridge>,
    runner: Arc<dyn SandboxRunner>,
    deadline: Duration,
}

impl RunCommandTool {
    pub fn new(
        guard: Arc<CommandGuard>,
        approvals: Arc<ApprovalStore>,
        bridge: Arc<ChannelBridge>,
        runner: Arc<dyn SandboxRunner>,
        deadline: Duration,
    ) -> Self {
        Self {
            guard,
            approvals,
            bridge,
            runner,
            deadline,
        }
    }
}

fn extract_command(args: &serde_json::Value) -> Option<String> {
    for key in ["command", "cmd", "script"] {
        if let Some(command) = args
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            return Some(command.to_string());
        }
    }
    args.as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the user's sandboxed workspace"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
        let Some(command) = extract_command(&args) else {
            return Ok(ToolResult::fail("Missing 'command' parameter"));
        };

        match self.guard.classify(&command) {
            CommandDecision::Forbidden { reason } => {
                warn!(user_id = ctx.user_id, %command, %reason, "forbidden command refused");
                Ok(ToolResult::fail(format!("Forbidden: {reason}")))
            }
            CommandDecision::Dangerous { reason } => {
                let id = self.approvals.store(
                    &ctx.session_id,
                    ctx.chat_id,
                    &command,
                    ctx.cwd.clone(),
                    &reason,
                );
                info!(
                    user_id = ctx.user_id,
                    command_id = %id,
                    %reason,
                    "dangerous command parked for approval"
                );

                if let Some(sink) = self.bridge.sink() {
                    if let Err(e) = sink
                        .show_approval(ctx.chat_id, &id, &command, &reason)
                        .await
                    {
                        warn!(command_id = %id, "failed to show approval prompt: {e:#}");
                    }
                }

                Ok(ToolResult::approval_pending(format!(
                    "Command requires approval ({reason}). Pending id: {id}. \
                     Stop and wait for the user's decision."
                )))
            }
            CommandDecision::Allow => {
                let outcome = self
                    .runner
                    .exec(ctx.user_id, &command, &ctx.cwd, self.deadline)
                    .await?;
                let output = sanitize_output(&outcome.output);
                if outcome.success {
                    Ok(ToolResult::ok(output))
                } else {
                    Ok(ToolResult::fail(output))
                }
            }
        }
    }
}
