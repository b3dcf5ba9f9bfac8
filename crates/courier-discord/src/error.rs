use std::time::Duration;

use courier_core::CourierError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured (set DISCORD_TOKEN)")]
    NoToken,

    #[error("Discord client did not become ready within {0:?}")]
    ReadyTimeout(Duration),
}

impl From<DiscordError> for CourierError {
    fn from(e: DiscordError) -> Self {
        match e {
            // Surface Discord's own wording (e.g. "Cannot send messages to this user").
            DiscordError::Serenity(inner) => CourierError::Platform(inner.to_string()),
            other => CourierError::Platform(other.to_string()),
        }
    }
}
