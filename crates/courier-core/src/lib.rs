pub mod config;
pub mod error;
pub mod messenger;
pub mod types;

pub use error::{CourierError, Result};
pub use messenger::{DirectMessenger, Recipient};
