use serenity::async_trait;
use serenity::gateway::{ConnectionStage, ShardStageUpdateEvent};
use serenity::model::event::ResumedEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use crate::readiness::Readiness;

/// Serenity event handler that keeps [`Readiness`] in step with the gateway.
pub struct DiscordHandler {
    pub readiness: Readiness,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.readiness.set(true);
        info!(
            name = %ready.user.name,
            id = %ready.user.id,
            session = %ready.session_id,
            "Discord bot connected"
        );
    }

    async fn resume(&self, _ctx: Context, _: ResumedEvent) {
        if !self.readiness.set(true) {
            info!("Discord: session resumed");
        }
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        debug!(shard = %event.shard_id, old = %event.old, new = %event.new, "Discord: shard stage");
        if apply_stage(&self.readiness, event.new) {
            warn!(shard = %event.shard_id, "Discord: gateway disconnected, relay not ready");
        }
    }
}

/// Clear readiness when a shard reports `Disconnected`.
///
/// Returns true when this call took the session from ready to not ready.
/// Connected stages are left alone; `ready`/`resume` are the events that
/// confirm the session can serve again.
fn apply_stage(readiness: &Readiness, stage: ConnectionStage) -> bool {
    match stage {
        ConnectionStage::Disconnected => readiness.set(false),
        _ => false,
    }
}
