//! Session readiness flag.
//!
//! Set by the gateway event handler on `ready`/`resume`, cleared when the
//! shard disconnects, read by every request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::error::DiscordError;

#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set(&self, ready: bool) -> bool {
        self.0.swap(ready, Ordering::AcqRel)
    }

    /// Poll every `poll` until ready, failing after `timeout`.
    pub async fn wait(&self, timeout: Duration, poll: Duration) -> Result<(), DiscordError> {
        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.is_ready() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DiscordError::ReadyTimeout(timeout));
            }
        }
    }
}
