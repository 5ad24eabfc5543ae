//! Gateway event routing.
//!
//! One consumer task owns the inbound event stream and folds each event
//! into the matching guild replica, strictly in arrival order. Replica
//! mutation is synchronous — nothing suspends between reading an event and
//! applying it, so per-guild ordering is exactly delivery ordering.
//! Interactions are the exception: each one runs as its own task so a slow
//! handler never stalls the stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::bot::Bot;
use super::events::{
    GatewayEvent, INTERACTION_KIND_AUTOCOMPLETE, INTERACTION_KIND_COMMAND, InteractionData,
};
use super::guild::Guild;
use crate::interactions::{SlashAutocompleteInteraction, SlashCommandInteraction, respond_unavailable};

/// Consume gateway events until the transport closes the stream.
pub async fn serve(bot: Arc<Bot>, mut events: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = events.recv().await {
        dispatch(&bot, event);
    }
    info!("gateway stream closed, dispatcher exiting");
}

/// Apply one gateway event to the replica.
pub fn dispatch(bot: &Arc<Bot>, event: GatewayEvent) {
    match event {
        GatewayEvent::Ready(data) => {
            info!(username = %data.user.username, id = %data.user.id, "logged in");
            bot.readiness
                .begin_session(data.guilds.into_iter().map(|g| g.id).collect());
        }

        GatewayEvent::Resumed(_) => bot.readiness.session_resumed(),

        GatewayEvent::GuildCreate(data) => {
            if let Some(guild) = bot.guild(&data.id) {
                guild.update_self(&data);
            } else {
                let guild = Guild::from_snapshot(
                    &data,
                    bot.cfg.bot.owner_ids.clone(),
                    bot.presence_tx.clone(),
                );
                bot.guilds.insert(data.id.clone(), Arc::new(guild));
            }
            bot.readiness.guild_snapshot_received(&data.id);
        }

        GatewayEvent::GuildUpdate(data) => match bot.guild(&data.id) {
            Some(guild) => guild.update_self(&data),
            None => warn!(guild_id = %data.id, "guild update for unknown guild"),
        },

        GatewayEvent::GuildDelete(data) => {
            if data.unavailable {
                // Outage: the guild stays queryable with stale data until
                // its snapshot comes back.
                warn!(guild_id = %data.id, "guild is unavailable due to an outage");
            } else if bot.guilds.remove(&data.id).is_some() {
                info!(guild_id = %data.id, "guild removed");
            } else {
                warn!(guild_id = %data.id, "guild delete for unknown guild");
            }
        }

        GatewayEvent::ChannelCreate(data) | GatewayEvent::ChannelUpdate(data) => {
            with_guild(bot, data.guild_id.as_deref(), "channel upsert", |guild| {
                guild.create_or_update_channel(&data)
            });
        }

        GatewayEvent::ChannelDelete(data) => {
            with_guild(bot, data.guild_id.as_deref(), "channel delete", |guild| {
                guild.delete_channel(&data.id)
            });
        }

        GatewayEvent::ThreadCreate(data) | GatewayEvent::ThreadUpdate(data) => {
            with_guild(bot, data.guild_id.as_deref(), "thread upsert", |guild| {
                guild.create_or_update_thread(&data)
            });
        }

        GatewayEvent::GuildMemberAdd(data) | GatewayEvent::GuildMemberUpdate(data) => {
            with_guild(bot, data.guild_id.as_deref(), "member upsert", |guild| {
                guild.create_or_update_member(&data)
            });
        }

        GatewayEvent::GuildMemberRemove(data) => {
            with_guild(bot, Some(&data.guild_id), "member remove", |guild| {
                guild.delete_member(&data.user.id)
            });
        }

        GatewayEvent::GuildRoleCreate(data) | GatewayEvent::GuildRoleUpdate(data) => {
            with_guild(bot, Some(&data.guild_id), "role upsert", |guild| {
                guild.create_or_update_role(&data.role)
            });
        }

        GatewayEvent::GuildRoleDelete(data) => {
            with_guild(bot, Some(&data.guild_id), "role delete", |guild| {
                guild.delete_role(&data.role_id)
            });
        }

        GatewayEvent::PresenceUpdate(data) => {
            with_guild(bot, data.guild_id.as_deref(), "presence update", |guild| {
                guild.update_presence(&data)
            });
        }

        GatewayEvent::InteractionCreate(data) => dispatch_interaction(bot, data),

        GatewayEvent::ShardDisconnect(data) => {
            if data.all_down {
                error!("no more connected shards left, bot is no longer ready");
            } else {
                error!("a shard closed connection");
            }
            bot.readiness.shard_disconnected(data.all_down);
        }

        GatewayEvent::Unknown => {}
    }
}

/// Resolve the replica an event targets; events for guilds the replica has
/// never seen are dropped with a log line.
fn with_guild(bot: &Bot, guild_id: Option<&str>, action: &str, apply: impl FnOnce(&Guild)) {
    let Some(guild_id) = guild_id else {
        warn!(action, "event without guild id");
        return;
    };
    match bot.guild(guild_id) {
        Some(guild) => apply(&guild),
        None => warn!(%guild_id, action, "event for unknown guild"),
    }
}

fn dispatch_interaction(bot: &Arc<Bot>, data: InteractionData) {
    // Incomplete replica: answer immediately and never reach a handler.
    if !bot.readiness.is_ready() {
        warn!(interaction_id = %data.id, "interaction received while not ready");
        let api = bot.api.clone();
        tokio::spawn(async move { respond_unavailable(api.as_ref(), &data).await });
        return;
    }

    match data.kind {
        INTERACTION_KIND_COMMAND => {
            let bot = bot.clone();
            tokio::spawn(async move {
                if let Some(interaction) = SlashCommandInteraction::new(bot, data) {
                    interaction.run().await;
                }
            });
        }
        INTERACTION_KIND_AUTOCOMPLETE => {
            let bot = bot.clone();
            tokio::spawn(async move {
                if let Some(interaction) = SlashAutocompleteInteraction::new(bot, data) {
                    interaction.answer().await;
                }
            });
        }
        _ => {}
    }
}

/// Once-per-second background tick. Runs every registered periodic
/// callback in registration order, sequentially, while the bot is ready.
/// A callback error propagates and takes the ticker down with it.
pub async fn run_ticker(bot: Arc<Bot>) -> anyhow::Result<()> {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tick.tick().await;
        if !bot.readiness.is_ready() {
            continue;
        }
        let frame_time = Utc::now().timestamp_millis() as f64 / 1000.0;
        for task in bot.registry.periodic_tasks() {
            task.tick(frame_time).await?;
        }
    }
}
