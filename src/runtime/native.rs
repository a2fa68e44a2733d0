//! Native command execution inside the user's workspace directory.

use super::traits::{ExecOutcome, SandboxRunner};
use crate::util::cap_output_bytes;
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variables passed through to commands. Functional variables
/// only; the parent environment is cleared so API keys never leak in.
const SAFE_ENV_VARS: &[&str] = &["PATH", "HOME", "TERM", "LANG", "LC_ALL", "USER", "SHELL"];

pub struct NativeRunner {
    max_output_bytes: usize,
}

impl NativeRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

#[async_trait]
impl SandboxRunner for NativeRunner {
    fn name(&self) -> &str {
        "native"
    }

    async fn exec(
        &self,
        user_id: i64,
        command: &str,
        cwd: &Path,
        deadline: Duration,
    ) -> anyhow::Result<ExecOutcome> {
        tokio::fs::create_dir_all(cwd)
            .await
            .with_context(|| format!("failed to create workspace {}", cwd.display()))?;

        debug!(user_id, %command, cwd = %cwd.display(), "executing command");

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .env_clear()
            .kill_on_drop(true);
        for var in SAFE_ENV_VARS {
            if let Ok(value) = std::env::var(var) {
                cmd.env(var, value);
            }
        }

        let result = tokio::time::timeout(deadline, cmd.output()).await;
        match result {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(stderr.trim_end());
                }

                let mut text = cap_output_bytes(combined.trim_end(), self.max_output_bytes);
                if text.is_empty() {
                    text = "(no output)".to_string();
                }

                Ok(ExecOutcome {
                    success: output.status.success(),
                    output: text,
                })
            }
            Ok(Err(e)) => Ok(ExecOutcome {
                success: false,
                output: format!("Failed to execute command: {e}"),
            }),
            Err(_) => Ok(ExecOutcome {
                success: false,
                output: format!("Timeout: command exceeded {}s", deadline.as_secs()),
            }),
        }
    }
}
