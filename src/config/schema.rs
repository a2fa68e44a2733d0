use crate::security::patterns::{default_dangerous_rules, default_forbidden_rules, RuleSpec};
use crate::security::paths::{
    default_blocked_dirs, default_sensitive_names, default_sensitive_patterns,
};
use crate::security::prompt_guard::default_injection_patterns;
use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, loaded from `config.toml` with env overrides.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Root under which every user gets `<root>/<user_id>` as their workspace.
    pub workspace_root: PathBuf,

    /// LLM proxy and agent loop settings (`[llm]`).
    pub llm: LlmConfig,

    /// Admission, rate limiting and message sizing (`[limits]`).
    pub limits: LimitsConfig,

    /// Approval store settings (`[approval]`).
    pub approval: ApprovalConfig,

    /// Sandbox execution settings (`[sandbox]`).
    pub sandbox: SandboxConfig,

    /// Telegram front-end settings (`[telegram]`).
    pub telegram: TelegramConfig,

    /// HTTP gateway settings (`[gateway]`).
    pub gateway: GatewayConfig,

    /// Guard pattern tables and path rules (`[guard]`). Data, not code:
    /// replacing a list here changes the classifier without touching it.
    pub guard: GuardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the key-holding proxy (OpenAI-compatible).
    pub proxy_url: String,
    pub model: String,
    pub temperature: f64,
    /// Hard deadline for one model call, seconds.
    pub deadline_secs: u64,
    /// Maximum tool-call iterations per turn.
    pub max_iterations: usize,
    /// Retained user/assistant exchange pairs per user.
    pub max_history: usize,
    /// Tool output cap (chars) before feeding back to the model.
    pub max_tool_output: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://proxy:3200".into(),
            model: "openai/gpt-oss-120b".into(),
            temperature: 0.7,
            deadline_secs: 120,
            max_iterations: 30,
            max_history: 10,
            max_tool_output: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LimitsConfig {
    /// Minimum interval between any two outbound sends, milliseconds.
    pub global_min_interval_ms: u64,
    /// Minimum interval between sends to the same group chat, milliseconds.
    pub group_min_interval_ms: u64,
    /// Send attempts before giving up on a rate-limited chat.
    pub max_retries: u32,
    /// Safety buffer added to provider retry-after, seconds.
    pub retry_buffer_secs: u64,
    /// Upper bound on concurrently active users.
    pub max_concurrent_users: usize,
    /// Outbound message split threshold, characters.
    pub message_max_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            global_min_interval_ms: 200,
            group_min_interval_ms: 5000,
            max_retries: 3,
            retry_buffer_secs: 5,
            max_concurrent_users: 10,
            message_max_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Pending-command lifetime, seconds. Expired records never execute.
    pub ttl_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SandboxConfig {
    /// Hard deadline for one command execution, seconds.
    pub deadline_secs: u64,
    /// Output cap per execution, bytes.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 180,
            max_output_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token. Overridden by `WARDEN_TELEGRAM_TOKEN`. When absent the
    /// Telegram channel is not started and only the gateway serves traffic.
    pub bot_token: Option<String>,
    /// Bot API base, overridable for self-hosted API servers.
    pub api_base: String,
    /// Long-poll timeout for getUpdates, seconds.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://api.telegram.org".into(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Request body cap, bytes.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 4000,
            max_body_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GuardConfig {
    /// Ordered forbidden rules (secret exfiltration).
    pub forbidden: Vec<RuleSpec>,
    /// Ordered dangerous rules (approval required).
    pub dangerous: Vec<RuleSpec>,
    /// Prompt-injection patterns.
    pub injection: Vec<String>,
    /// Secret file base names.
    pub sensitive_names: Vec<String>,
    /// Secret file full-path regexes.
    pub sensitive_patterns: Vec<String>,
    /// Blocked system directories.
    pub blocked_dirs: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            forbidden: default_forbidden_rules(),
            dangerous: default_dangerous_rules(),
            injection: default_injection_patterns(),
            sensitive_names: default_sensitive_names(),
            sensitive_patterns: default_sensitive_patterns(),
            blocked_dirs: default_blocked_dirs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("/workspace"),
            llm: LlmConfig::default(),
            limits: LimitsConfig::default(),
            approval: ApprovalConfig::default(),
            sandbox: SandboxConfig::default(),
            telegram: TelegramConfig::default(),
            gateway: GatewayConfig::default(),
            guard: GuardConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when absent, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Deployment-level overrides: secrets and endpoints come from the
    /// environment, never from the config file checked into a volume.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("WARDEN_TELEGRAM_TOKEN") {
            if !token.is_empty() {
                self.telegram.bot_token = Some(token);
            }
        }
        if let Ok(url) = std::env::var("WARDEN_PROXY_URL") {
            if !url.is_empty() {
                self.llm.proxy_url = url;
            }
        }
        if let Ok(model) = std::env::var("WARDEN_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(root) = std::env::var("WARDEN_WORKSPACE") {
            if !root.is_empty() {
                self.workspace_root = PathBuf::from(root);
            }
        }
        if let Ok(port) = std::env::var("WARDEN_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
    }

    pub fn llm_deadline(&self) -> Duration {
        Duration::from_secs(self.llm.deadline_secs)
    }

    pub fn sandbox_deadline(&self) -> Duration {
        Duration::from_secs(self.sandbox.deadline_secs)
    }

    pub fn approval_ttl(&self) -> Duration {
        Duration::from_secs(self.approval.ttl_secs)
    }

    pub fn global_min_interval(&self) -> Duration {
        Duration::from_millis(self.limits.global_min_interval_ms)
    }

    pub fn group_min_interval(&self) -> Duration {
        Duration::from_millis(self.limits.group_min_interval_ms)
    }

    pub fn retry_buffer(&self) -> Duration {
        Duration::from_secs(self.limits.retry_buffer_secs)
    }

    /// Per-user workspace directory.
    pub fn user_workspace(&self, user_id: i64) -> PathBuf {
        self.workspace_root.join(user_id.to_string())
    }
}
