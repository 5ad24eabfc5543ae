//! Command, autocomplete, periodic and shutdown registration.
//!
//! One `Registry` is owned by the runtime instance; collaborator modules
//! populate it at startup. Command and autocomplete registration is
//! last-write-wins; periodic and shutdown callbacks keep registration
//! order, which is the order they run in.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::HandlerError;
use crate::interactions::{SlashAutocompleteInteraction, SlashCommandInteraction};

/// A slash-command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, interaction: &SlashCommandInteraction) -> Result<(), HandlerError>;
}

/// An autocomplete provider for one option name.
#[async_trait]
pub trait AutocompleteHandler: Send + Sync {
    async fn suggest(
        &self,
        interaction: &SlashAutocompleteInteraction,
    ) -> Result<Vec<Choice>, HandlerError>;
}

/// A background callback driven by the once-per-second tick.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    async fn tick(&self, frame_time: f64) -> anyhow::Result<()>;
}

/// A callback run once at orderly shutdown.
#[async_trait]
pub trait ShutdownTask: Send + Sync {
    async fn close(&self) -> anyhow::Result<()>;
}

/// One autocomplete suggestion shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub name: String,
    pub value: Value,
}

/// A registered command with its delivery preferences.
#[derive(Clone)]
pub struct CommandRegistration {
    /// Replies visible only to the invoking user.
    pub ephemeral: bool,
    /// Raced against the acknowledgement deadline and deferred on timeout.
    pub expensive: bool,
    pub handler: Arc<dyn CommandHandler>,
}

#[derive(Default)]
pub struct Registry {
    commands: DashMap<String, CommandRegistration>,
    autocompletes: DashMap<String, Arc<dyn AutocompleteHandler>>,
    periodic: RwLock<Vec<Arc<dyn PeriodicTask>>>,
    shutdown: RwLock<Vec<Arc<dyn ShutdownTask>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(
        &self,
        name: &str,
        ephemeral: bool,
        expensive: bool,
        handler: Arc<dyn CommandHandler>,
    ) {
        info!(command = %name, "registered slash command");
        self.commands.insert(
            name.to_string(),
            CommandRegistration {
                ephemeral,
                expensive,
                handler,
            },
        );
    }

    pub fn register_autocomplete(&self, option_name: &str, handler: Arc<dyn AutocompleteHandler>) {
        info!(option = %option_name, "registered slash option autocomplete");
        self.autocompletes.insert(option_name.to_string(), handler);
    }

    pub fn register_periodic(&self, task: Arc<dyn PeriodicTask>) {
        self.periodic.write().expect("periodic task list lock").push(task);
    }

    pub fn register_shutdown(&self, task: Arc<dyn ShutdownTask>) {
        self.shutdown.write().expect("shutdown task list lock").push(task);
    }

    pub fn command(&self, name: &str) -> Option<CommandRegistration> {
        self.commands.get(name).map(|r| r.clone())
    }

    pub fn autocomplete(&self, option_name: &str) -> Option<Arc<dyn AutocompleteHandler>> {
        self.autocompletes.get(option_name).map(|h| h.clone())
    }

    /// Periodic tasks in registration order.
    pub fn periodic_tasks(&self) -> Vec<Arc<dyn PeriodicTask>> {
        self.periodic.read().expect("periodic task list lock").clone()
    }

    /// Shutdown tasks in registration order.
    pub fn shutdown_tasks(&self) -> Vec<Arc<dyn ShutdownTask>> {
        self.shutdown.read().expect("shutdown task list lock").clone()
    }
}
