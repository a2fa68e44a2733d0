pub mod schema;

pub use schema::{
    ApprovalConfig, Config, GatewayConfig, GuardConfig, LimitsConfig, LlmConfig, SandboxConfig,
    TelegramConfig,
};
