//! Direct-message delivery over Discord REST.

use std::num::NonZeroU64;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::http::{Http, HttpError};
use serenity::model::id::UserId;
use tracing::debug;

use courier_core::types::EmbedRequest;
use courier_core::{DirectMessenger, Recipient, Result};

use crate::error::DiscordError;
use crate::readiness::Readiness;

/// Discord's JSON error code for "Unknown User".
const UNKNOWN_USER: isize = 10013;

/// A connected bot session: the REST client plus live readiness.
///
/// `Arc<Http>` is the REST client, not the gateway WebSocket, so it stays
/// valid while the gateway reconnects underneath.
pub struct DiscordSession {
    http: Arc<Http>,
    readiness: Readiness,
}

impl DiscordSession {
    pub fn new(http: Arc<Http>, readiness: Readiness) -> Self {
        Self { http, readiness }
    }

    async fn send(&self, to: &Recipient, message: CreateMessage) -> Result<()> {
        let user_id = UserId::new(to.id);
        let dm = user_id
            .create_dm_channel(&self.http)
            .await
            .map_err(DiscordError::from)?;
        let sent = dm
            .id
            .send_message(&self.http, message)
            .await
            .map_err(DiscordError::from)?;
        debug!(user_id = to.id, channel_id = %dm.id, message_id = %sent.id, "discord: DM sent");
        Ok(())
    }
}

#[async_trait]
impl DirectMessenger for DiscordSession {
    fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    async fn find_user(&self, user_id: u64) -> Result<Option<Recipient>> {
        // Discord ids are non-zero snowflakes.
        let Some(id) = NonZeroU64::new(user_id) else {
            return Ok(None);
        };

        match self.http.get_user(UserId::from(id)).await {
            Ok(user) => Ok(Some(Recipient {
                id: user.id.get(),
                name: user.name,
            })),
            Err(e) if is_unknown_user(&e) => Ok(None),
            Err(e) => Err(DiscordError::from(e).into()),
        }
    }

    async fn send_text(&self, to: &Recipient, content: &str) -> Result<()> {
        self.send(to, CreateMessage::new().content(content)).await
    }

    async fn send_embed(&self, to: &Recipient, embed: &EmbedRequest) -> Result<()> {
        let embed: CreateEmbed = crate::embed::build_embed(embed);
        self.send(to, CreateMessage::new().embed(embed)).await
    }
}

/// True for REST failures meaning the user id does not exist.
fn is_unknown_user(e: &serenity::Error) -> bool {
    match e {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            resp.status_code.as_u16() == 404 || resp.error.code == UNKNOWN_USER
        }
        _ => false,
    }
}
