//! The central runtime hub.
//!
//! Owns the guild replicas, the readiness state, the registration surface
//! and the API handle. Everything a collaborator module touches hangs off
//! an `Arc<Bot>`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::info;

use super::guild::{Guild, PresenceChange};
use super::readiness::Readiness;
use crate::config::BotConfig;
use crate::http::Api;
use crate::registry::Registry;

/// Queued presence-change notifications per subscriber before lag.
const PRESENCE_CHANNEL_CAPACITY: usize = 256;

pub struct Bot {
    pub cfg: BotConfig,
    pub api: Arc<dyn Api>,
    /// Guild replicas keyed by guild id, written only by the dispatcher.
    pub guilds: DashMap<String, Arc<Guild>>,
    pub readiness: Readiness,
    pub registry: Registry,
    pub(crate) presence_tx: broadcast::Sender<PresenceChange>,
}

impl Bot {
    pub fn new(cfg: BotConfig, api: Arc<dyn Api>) -> Self {
        let (presence_tx, _) = broadcast::channel(PRESENCE_CHANNEL_CAPACITY);
        Self {
            cfg,
            api,
            guilds: DashMap::new(),
            readiness: Readiness::new(),
            registry: Registry::new(),
            presence_tx,
        }
    }

    pub fn guild(&self, guild_id: &str) -> Option<Arc<Guild>> {
        self.guilds.get(guild_id).map(|g| g.clone())
    }

    /// Subscribe to presence transitions across all guilds.
    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceChange> {
        self.presence_tx.subscribe()
    }

    /// Run registered shutdown callbacks in registration order.
    pub async fn close(&self) -> anyhow::Result<()> {
        for task in self.registry.shutdown_tasks() {
            task.close().await?;
        }
        info!("shutdown tasks completed");
        Ok(())
    }
}
