//! Session readiness tracking.
//!
//! After a session starts, the gateway announces which guilds belong to it
//! and then streams one snapshot per guild. Until every announced guild has
//! reported in, the replica is incomplete and no command may be served.
//! Losing every shard drops readiness again without touching cached state.

use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub struct Readiness {
    /// Guild ids still awaiting their initial snapshot.
    pending: DashSet<String>,
    ready: AtomicBool,
    /// True until the first session ever completes loading; lets startup
    /// hooks distinguish a fresh boot from a reconnect.
    first_ready: AtomicBool,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            pending: DashSet::new(),
            ready: AtomicBool::new(false),
            first_ready: AtomicBool::new(true),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Whether no session has ever finished loading yet.
    pub fn is_first_ready(&self) -> bool {
        self.first_ready.load(Ordering::SeqCst)
    }

    /// A new session started with this guild-id list; snapshots follow.
    pub fn begin_session(&self, guild_ids: Vec<String>) {
        self.pending.clear();
        for id in guild_ids {
            self.pending.insert(id);
        }

        if self.pending.is_empty() {
            self.first_ready.store(false, Ordering::SeqCst);
            self.ready.store(true, Ordering::SeqCst);
        } else {
            info!(remaining = self.pending.len(), "waiting for guild data");
            self.ready.store(false, Ordering::SeqCst);
        }
    }

    /// A guild snapshot arrived. No-op once ready (runtime guild joins are
    /// not session bookkeeping).
    pub fn guild_snapshot_received(&self, guild_id: &str) {
        if self.is_ready() {
            return;
        }

        if self.pending.remove(guild_id).is_none() {
            warn!(%guild_id, "unexpected guild snapshot during session load");
        }

        if self.pending.is_empty() {
            self.first_ready.store(false, Ordering::SeqCst);
            self.ready.store(true, Ordering::SeqCst);
            info!("all guilds loaded, ready to operate");
        }
    }

    /// The gateway resumed an interrupted session; cached state is current
    /// again without a fresh snapshot round.
    pub fn session_resumed(&self) {
        info!("connection was resumed");
        self.ready.store(true, Ordering::SeqCst);
    }

    /// A shard dropped. Only total shard loss unreadies the bot; replica
    /// data stays put either way.
    pub fn shard_disconnected(&self, all_down: bool) {
        if all_down {
            self.ready.store(false, Ordering::SeqCst);
        }
    }
}
