use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use courier_core::config::DiscordConfig;

use crate::error::DiscordError;
use crate::handler::DiscordHandler;
use crate::readiness::Readiness;
use crate::session::DiscordSession;

/// Direct messages are all the relay needs; no guild or content intents.
const INTENTS: GatewayIntents = GatewayIntents::DIRECT_MESSAGES;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REBUILD_DELAY: Duration = Duration::from_secs(30);

/// Discord session manager.
///
/// Logs in, drives the gateway on a background task and blocks startup
/// until the session is ready.
pub struct DiscordAdapter {
    config: DiscordConfig,
}

/// A running gateway plus the session handle requests use.
pub struct DiscordConnection {
    session: Arc<DiscordSession>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Connect and wait for the first `ready` event.
    ///
    /// Fails with [`DiscordError::NoToken`] before touching the network when
    /// no token is configured, and with [`DiscordError::ReadyTimeout`] when
    /// the gateway does not become ready within `ready_timeout_secs`.
    pub async fn connect(self) -> Result<DiscordConnection, DiscordError> {
        let token = self.config.token().ok_or(DiscordError::NoToken)?.to_string();
        let readiness = Readiness::new();

        let client = build_client(&token, &readiness).await?;
        // Arc<Http> is a REST client — it stays valid across gateway reconnects.
        let http = Arc::clone(&client.http);

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_gateway(client, token, readiness.clone(), stop_rx));

        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        let poll = Duration::from_millis(self.config.ready_poll_ms.max(1));
        info!(timeout = ?timeout, "Discord: waiting for gateway ready");

        if let Err(e) = readiness.wait(timeout, poll).await {
            let _ = stop.send(true);
            let _ = task.await;
            return Err(e);
        }

        Ok(DiscordConnection {
            session: Arc::new(DiscordSession::new(http, readiness)),
            stop,
            task,
        })
    }
}

impl DiscordConnection {
    pub fn session(&self) -> Arc<DiscordSession> {
        Arc::clone(&self.session)
    }

    /// Close the gateway and wait for the background task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Discord: gateway task ended abnormally");
        }
    }
}

/// Build a fresh serenity `Client` with the readiness-tracking handler.
async fn build_client(token: &str, readiness: &Readiness) -> Result<Client, serenity::Error> {
    let handler = DiscordHandler {
        readiness: readiness.clone(),
    };

    Client::builder(token, INTENTS).event_handler(handler).await
}

/// Keep the gateway connected until `stop` fires.
///
/// Serenity resumes dropped shards on its own; this loop only covers
/// `Client::start` returning, by rebuilding the client.
async fn run_gateway(
    mut client: Client,
    token: String,
    readiness: Readiness,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        info!("Discord: gateway connecting");
        let shards = Arc::clone(&client.shard_manager);

        tokio::select! {
            res = client.start() => {
                readiness.set(false);
                match res {
                    Err(e) => warn!("Discord: gateway error ({e}), reconnecting in 5s"),
                    Ok(()) => info!("Discord: gateway stopped cleanly, reconnecting in 5s"),
                }
            }
            _ = stop.changed() => {
                shards.shutdown_all().await;
                readiness.set(false);
                info!("Discord: gateway shut down");
                return;
            }
        }

        if pause(&mut stop, RECONNECT_DELAY).await {
            return;
        }

        // Rebuild the client for the next attempt.
        client = loop {
            match build_client(&token, &readiness).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: reconnect failed ({e}), retrying in 30s");
                    if pause(&mut stop, REBUILD_DELAY).await {
                        return;
                    }
                }
            }
        };
    }
}

/// Sleep for `delay`; true when a stop was requested meanwhile.
async fn pause(stop: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop.changed() => true,
    }
}
