use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Outcome of one sandboxed command execution.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub success: bool,
    pub output: String,
}

/// Execution backend for approved shell commands.
///
/// The core validates and hands off `(command, cwd)`; it never owns the
/// execution environment. Production deployments plug in a container-backed
/// runner; [`NativeRunner`](super::NativeRunner) executes directly in the
/// user's workspace for tests and single-host setups.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn exec(
        &self,
        user_id: i64,
        command: &str,
        cwd: &Path,
        deadline: Duration,
    ) -> anyhow::Result<ExecOutcome>;
}
