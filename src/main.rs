use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use chatcmd::channels::{Channel, TelegramChannel};
use chatcmd::config::Config;
use chatcmd::dispatcher::Dispatcher;
use chatcmd::rules::RuleSet;

/// Run local commands from chat messages, routed by regex rules.
#[derive(Parser, Debug)]
#[command(name = "chatcmd", version, about)]
struct Cli {
    /// Path to the YAML rule config file.
    config_path: PathBuf,

    /// Telegram bot token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Comma-separated usernames or ids allowed to trigger commands;
    /// `*` allows everyone.
    #[arg(long, env = "TELEGRAM_ALLOWED_USERS", default_value = "*")]
    allowed_users: String,

    /// Enable debug logging.
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = Config::load(&cli.config_path)
        .with_context(|| format!("error loading config {}", cli.config_path.display()))?;
    let timeout = config.command_timeout();
    let rules = RuleSet::compile(config.rules).context("invalid rule set")?;

    let allowed_users: Vec<String> = cli
        .allowed_users
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let channel = Arc::new(TelegramChannel::new(
        SecretString::from(cli.token),
        allowed_users,
    ));
    channel
        .health_check()
        .await
        .context("cannot reach the Telegram Bot API")?;

    // One top-level shutdown signal; per-message deadlines are bounded
    // by it so an interrupt aborts in-flight executions immediately.
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down...");
            signal.cancel();
        }
    });

    Dispatcher::new(rules, timeout).run(channel, shutdown).await?;

    Ok(())
}
