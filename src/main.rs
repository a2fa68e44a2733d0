use anyhow::Context;
use clap::Parser;
use shellwarden::agent::AgentCore;
use shellwarden::channels::{SendGate, TelegramChannel};
use shellwarden::gateway;
use shellwarden::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Telegram-fronted AI agent with a command guard and approval core.
#[derive(Parser, Debug)]
#[command(name = "shellwarden", version, about)]
struct Cli {
    /// Path to config.toml. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the gateway port.
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shellwarden=info"));
    let subscriber = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    let config = Arc::new(config);

    info!(
        workspace = %config.workspace_root.display(),
        model = %config.llm.model,
        port = config.gateway.port,
        "shellwarden starting"
    );

    let core = AgentCore::new(Arc::clone(&config)).context("failed to wire agent core")?;

    if config.telegram.bot_token.is_some() {
        let gate = SendGate::new(
            config.global_min_interval(),
            config.group_min_interval(),
            config.limits.max_retries,
            config.retry_buffer(),
        );
        let channel = Arc::new(TelegramChannel::new(
            &config.telegram,
            config.limits.message_max_chars,
            gate,
            Arc::clone(&core),
        )?);
        core.bridge().register(Arc::clone(&channel) as _);

        tokio::spawn(async move {
            if let Err(e) = channel.listen().await {
                warn!("telegram channel stopped: {e:#}");
            }
        });
    } else {
        warn!("no telegram token configured, running gateway only");
    }

    gateway::serve(core, &config.gateway).await
}
