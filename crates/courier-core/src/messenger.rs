//! The seam between HTTP request handling and the chat platform.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::EmbedRequest;

/// A platform user that direct messages can be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: u64,
    pub name: String,
}

/// Direct-message capability of a connected platform session.
///
/// Implementations are shared across concurrent requests, so every method
/// takes `&self`.
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    /// Whether the session can currently look up users and send.
    fn is_ready(&self) -> bool;

    /// Look up a user by id. `Ok(None)` when the platform knows no such user.
    async fn find_user(&self, user_id: u64) -> Result<Option<Recipient>>;

    /// Send one plain-text direct message.
    async fn send_text(&self, to: &Recipient, content: &str) -> Result<()>;

    /// Build `embed` and send it as one direct message.
    async fn send_embed(&self, to: &Recipient, embed: &EmbedRequest) -> Result<()>;
}
