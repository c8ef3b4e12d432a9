use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use community_robot::access::{AccessBot, Forwarder};
use community_robot::client::{AtomGitClient, HttpSigInfoCache};
use community_robot::framework::{self, Robot, ServiceOptions, load_secret};
use community_robot::labels::LabelBot;
use community_robot::review::ReviewBot;

/// AtomGit community bots.
#[derive(Debug, Parser)]
#[command(name = "community-robot", version)]
struct Cli {
    #[command(subcommand)]
    bot: BotCommand,

    #[command(flatten)]
    service: ServiceArgs,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Debug, Subcommand)]
enum BotCommand {
    /// Review commands and the merge gate.
    Review {
        #[command(flatten)]
        platform: PlatformArgs,

        /// Base URL of the SIG-info cache. Branch keepers need it.
        #[arg(long, env = "SIG_CACHE_ENDPOINT")]
        sig_cache_endpoint: Option<String>,
    },
    /// Label commands.
    Label {
        #[command(flatten)]
        platform: PlatformArgs,
    },
    /// Relays verified deliveries to the other bots.
    Access,
}

#[derive(Debug, Args)]
struct ServiceArgs {
    #[arg(long, env = "PORT", default_value_t = 8888, global = true)]
    port: u16,

    #[arg(long, env = "CONFIG_FILE", default_value = "/etc/robot/config.yaml", global = true)]
    config_file: PathBuf,

    /// File holding the HMAC secret shared with the relay.
    #[arg(
        long,
        env = "WEBHOOK_SECRET_PATH",
        default_value = "/etc/webhook/hmac",
        global = true
    )]
    webhook_secret_path: PathBuf,

    /// Seconds to wait for in-flight events on shutdown.
    #[arg(long, env = "GRACE_PERIOD_SECS", default_value_t = 180, global = true)]
    grace_period_secs: u64,

    #[arg(long, env = "CONFIG_RELOAD_SECS", default_value_t = 60, global = true)]
    config_reload_secs: u64,
}

#[derive(Debug, Args)]
struct PlatformArgs {
    /// File holding the bot account's API token.
    #[arg(long, env = "TOKEN_PATH", default_value = "/etc/robot/token")]
    token_path: PathBuf,

    #[arg(long, env = "API_ENDPOINT", default_value = "https://api.atomgit.com")]
    api_endpoint: String,
}

impl PlatformArgs {
    fn client(&self) -> anyhow::Result<AtomGitClient> {
        let token = read_token(&self.token_path)?;
        AtomGitClient::from_token(&self.api_endpoint, token)
            .with_context(|| format!("failed to build client for {}", self.api_endpoint))
    }
}

fn read_token(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read token from {}", path.display()))?;
    Ok(raw.trim().to_string())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "community_robot=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve<R: Robot>(bot: R, service: &ServiceArgs) -> anyhow::Result<()> {
    let secret = load_secret(&service.webhook_secret_path)?;
    let options = ServiceOptions {
        port: service.port,
        config_file: service.config_file.clone(),
        grace_period: Duration::from_secs(service.grace_period_secs),
        config_reload_interval: Duration::from_secs(service.config_reload_secs),
    };
    info!(bot = bot.name(), port = options.port, "starting");
    framework::run(Arc::new(bot), options, secret).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match &cli.bot {
        BotCommand::Review {
            platform,
            sig_cache_endpoint,
        } => {
            let sig_cache = sig_cache_endpoint.as_deref().map(HttpSigInfoCache::new);
            serve(ReviewBot::new(platform.client()?, sig_cache), &cli.service).await
        }
        BotCommand::Label { platform } => serve(LabelBot::new(platform.client()?), &cli.service).await,
        BotCommand::Access => serve(AccessBot::new(Forwarder::default()), &cli.service).await,
    }
}
