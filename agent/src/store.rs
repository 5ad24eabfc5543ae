//! Narrow persistent-store surface for collaborator modules.
//!
//! The runtime core itself is fully in-memory and rebuilds its replica from
//! the gateway snapshot on every connect; command modules that need durable
//! state (timers, per-guild settings, subscriptions) go through this trait.
//! Backends live in collaborator crates.

use async_trait::async_trait;
use serde_json::Value;

/// Exact-match row access over `(table, key)` pairs with JSON values.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, table: &str, key: &str, value: Value) -> anyhow::Result<()>;

    async fn select(&self, table: &str, key: &str) -> anyhow::Result<Option<Value>>;

    async fn update(&self, table: &str, key: &str, value: Value) -> anyhow::Result<()>;

    async fn delete(&self, table: &str, key: &str) -> anyhow::Result<()>;
}
