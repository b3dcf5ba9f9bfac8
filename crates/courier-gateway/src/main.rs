use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

mod app;
mod error;
mod http;

use courier_core::config::CourierConfig;
use courier_discord::DiscordAdapter;

const DEFAULT_LOG_FILTER: &str =
    "courier_gateway=info,courier_discord=info,serenity=warn,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // serenity logs through `tracing`, so its gateway diagnostics land here too.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // load config: COURIER_CONFIG path > ./courier.toml, then env overrides
    let config_path = std::env::var("COURIER_CONFIG").ok();
    let config = CourierConfig::load(config_path.as_deref()).context("loading configuration")?;

    // connect to Discord and block until ready (or fail startup)
    let discord = DiscordAdapter::new(&config.discord)
        .connect()
        .await
        .context("starting Discord session")?;
    info!("Discord client ready");

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port)
        .parse()
        .context("invalid gateway bind address")?;

    let state = Arc::new(app::AppState::new(config, discord.session()));
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("Courier relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutting down...");
    discord.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
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
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
