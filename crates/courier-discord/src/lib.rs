pub mod adapter;
pub mod embed;
pub mod error;
pub mod handler;
pub mod readiness;
pub mod session;

pub use adapter::{DiscordAdapter, DiscordConnection};
pub use error::DiscordError;
pub use readiness::Readiness;
pub use session::DiscordSession;
