//! Bot runtime: config agent, registry, dispatcher and HTTP server wired
//! together, with graceful shutdown.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatcher::Dispatcher;
use super::registry::{HandlerRegistry, RegistryError};
use crate::config::{BotConfig, ConfigAgent};
use crate::server::{AppState, build_router};

/// A bot built on the framework.
pub trait Robot: Send + Sync + 'static {
    type Config: BotConfig;

    fn name(&self) -> &'static str;

    /// Registers the handlers for the event categories the bot cares about.
    fn register(
        self: Arc<Self>,
        registry: &mut HandlerRegistry<Self::Config>,
    ) -> Result<(), RegistryError>;
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub port: u16,
    pub config_file: PathBuf,
    /// Upper bound on how long shutdown waits for in-flight handlers.
    pub grace_period: Duration,
    pub config_reload_interval: Duration,
}

/// Reads the webhook secret, dropping trailing whitespace.
pub fn load_secret(path: &Path) -> anyhow::Result<Vec<u8>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read secret from {}", path.display()))?;
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    Ok(raw[..end].to_vec())
}

/// Builds the dispatcher for `bot` without starting the server.
pub fn build_dispatcher<R: Robot>(
    bot: Arc<R>,
    config: ConfigAgent<R::Config>,
) -> Result<Dispatcher<R::Config>, RegistryError> {
    let mut registry = HandlerRegistry::new();
    bot.register(&mut registry)?;
    Ok(Dispatcher::new(registry, config))
}

/// Serves `bot` until SIGINT or SIGTERM, then drains in-flight handlers.
pub async fn run<R: Robot>(
    bot: Arc<R>,
    options: ServiceOptions,
    webhook_secret: Vec<u8>,
) -> anyhow::Result<()> {
    let name = bot.name();
    let config = ConfigAgent::<R::Config>::load(&options.config_file)
        .with_context(|| format!("failed to load config {}", options.config_file.display()))?;

    let dispatcher = build_dispatcher(bot, config.clone())?;

    let cancel = CancellationToken::new();
    let reload = config.spawn_reload(options.config_reload_interval, cancel.clone());

    let app = build_router(AppState::new(webhook_secret, Arc::new(dispatcher.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(bot = name, %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cancel.cancel();
    drain(&dispatcher, options.grace_period).await;
    if let Err(e) = reload.await {
        warn!(error = %e, "config reload task failed");
    }

    info!(bot = name, "stopped");
    Ok(())
}

/// Waits for in-flight handlers, giving up after `grace_period`.
pub async fn drain<C: BotConfig>(dispatcher: &Dispatcher<C>, grace_period: Duration) -> bool {
    let in_flight = dispatcher.in_flight();
    if in_flight > 0 {
        info!(in_flight, "waiting for in-flight handlers");
    }
    match tokio::time::timeout(grace_period, dispatcher.shutdown()).await {
        Ok(()) => true,
        Err(_) => {
            warn!(
                in_flight = dispatcher.in_flight(),
                grace_period_secs = grace_period.as_secs(),
                "grace period elapsed with handlers still running"
            );
            false
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use serde::Deserialize;
    use tokio::sync::Notify;

    use crate::framework::{Dispatch, HandlerContext};

    #[derive(Debug, Deserialize)]
    struct Cfg {}

    impl BotConfig for Cfg {}

    struct Blocking {
        release: Arc<Notify>,
    }

    impl Robot for Blocking {
        type Config = Cfg;

        fn name(&self) -> &'static str {
            "blocking"
        }

        fn register(self: Arc<Self>, registry: &mut HandlerRegistry<Cfg>) -> Result<(), RegistryError> {
            registry.on_push(move |_, _: HandlerContext<Cfg>| {
                let release = Arc::clone(&self.release);
                async move {
                    release.notified().await;
                    Ok(())
                }
            })
        }
    }

    const PUSH: &[u8] =
        br#"{ "ref": "refs/heads/master", "repository": { "full_name": "openeuler/docs" } }"#;

    #[test]
    fn load_secret_trims_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"s3cret\n").unwrap();
        assert_eq!(load_secret(file.path()).unwrap(), b"s3cret");
    }

    #[test]
    fn load_secret_missing_file_fails() {
        assert!(load_secret(Path::new("/nonexistent/secret")).is_err());
    }

    #[tokio::test]
    async fn drain_completes_when_handlers_finish() {
        let release = Arc::new(Notify::new());
        let bot = Arc::new(Blocking {
            release: Arc::clone(&release),
        });
        let dispatcher = build_dispatcher(bot, ConfigAgent::fixed(Cfg {})).unwrap();
        dispatcher.dispatch("push", None, PUSH).unwrap();

        release.notify_one();
        assert!(drain(&dispatcher, Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_grace_period() {
        let bot = Arc::new(Blocking {
            release: Arc::new(Notify::new()),
        });
        let dispatcher = build_dispatcher(bot, ConfigAgent::fixed(Cfg {})).unwrap();
        dispatcher.dispatch("push", None, PUSH).unwrap();

        assert!(!drain(&dispatcher, Duration::from_secs(1)).await);
        assert_eq!(dispatcher.in_flight(), 1);
    }
}
