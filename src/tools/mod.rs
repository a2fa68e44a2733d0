//! Tool surface exposed to the LLM.
//!
//! Each tool implements the [`Tool`] trait: a name, a description, a JSON
//! parameter schema, and an async `execute` returning a structured
//! [`ToolResult`]. Guard enforcement is injected at construction time: the
//! shell tool carries the command guard and approval store, the file tools
//! carry the path guard. [`default_tools`] assembles the registry.

pub mod file_delete;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod shell;
pub mod traits;

pub use file_delete::DeleteFileTool;
pub use file_edit::EditFileTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use list_dir::ListDirectoryTool;
pub use shell::RunCommandTool;
pub use traits::{Tool, ToolContext, ToolResult, ToolSpec};

use crate::approval::ApprovalStore;
use crate::channels::traits::ChannelBridge;
use crate::runtime::SandboxRunner;
use crate::security::{CommandGuard, PathGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolve a tool-supplied path against the turn context.
///
/// Relative paths join the working directory. A common model mistake is
/// addressed here: absolute paths under the shared workspace root that skip
/// the per-user segment (`/workspace/file.txt`) are rewritten into the user's
/// own tree. Paths naming a different user's tree are left untouched so the
/// containment check rejects them.
pub(crate) fn normalize_tool_path(input: &str, ctx: &ToolContext) -> PathBuf {
    let candidate = Path::new(input);
    if !candidate.is_absolute() {
        return ctx.cwd.join(candidate);
    }

    if candidate.starts_with(&ctx.workspace) {
        return candidate.to_path_buf();
    }

    if let Some(root) = ctx.workspace.parent() {
        if let Ok(remainder) = candidate.strip_prefix(root) {
            let first = remainder
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default();
            // A leading all-digit segment is another user's tree; leave it
            // for the containment check to reject.
            if !first.is_empty() && !first.chars().all(|c| c.is_ascii_digit()) {
                let fixed = ctx.workspace.join(remainder);
                debug!(input, fixed = %fixed.display(), "auto-fixed workspace path");
                return fixed;
            }
        }
    }

    candidate.to_path_buf()
}

/// Assemble the default tool registry.
pub fn default_tools(
    command_guard: Arc<CommandGuard>,
    path_guard: Arc<PathGuard>,
    approvals: Arc<ApprovalStore>,
    bridge: Arc<ChannelBridge>,
    runner: Arc<dyn SandboxRunner>,
    sandbox_deadline: Duration,
) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(RunCommandTool::new(
            command_guard,
            Arc::clone(&approvals),
            bridge,
            runner,
            sandbox_deadline,
        )),
        Arc::new(ReadFileTool::new(Arc::clone(&path_guard))),
        Arc::new(WriteFileTool::new(Arc::clone(&path_guard))),
        Arc::new(EditFileTool::new(Arc::clone(&path_guard))),
        Arc::new(DeleteFileTool::new(Arc::clone(&path_guard))),
        Arc::new(ListDirectoryTool::new(path_guard)),
    ]
}
