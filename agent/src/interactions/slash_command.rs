//! Slash-command interaction lifecycle.
//!
//! Commands must be acknowledged within 3 seconds of creation. Cheap
//! handlers run to completion and their reply is the initial response.
//! Expensive handlers are raced against the remaining budget: on timeout a
//! minimal deferred acknowledgement goes out and the handler keeps running,
//! its eventual reply delivered as a follow-up. Handlers are never
//! cancelled.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::{
    EPHEMERAL_FLAG, RESPONSE_CHANNEL_MESSAGE, RESPONSE_DEFERRED, parse_command_options,
    resolve_author, snowflake_timestamp,
};
use crate::colors;
use crate::engine::bot::Bot;
use crate::engine::events::InteractionData;
use crate::engine::guild::Guild;
use crate::engine::objects::{Channel, Member};
use crate::errors::HandlerError;
use crate::http::ApiError;
use crate::registry::CommandRegistration;

/// Hard acknowledgement deadline the platform enforces, in seconds.
const ACK_DEADLINE_SECS: f64 = 3.0;

/// Budget granted to an expensive handler before the deferred ack goes
/// out; the half second of headroom covers the ack round-trip itself.
const DEFER_BUDGET_SECS: f64 = 2.5;

/// One inbound slash-command invocation, resolved against the replica.
pub struct SlashCommandInteraction {
    pub bot: Arc<Bot>,
    pub data: InteractionData,
    pub guild: Option<Arc<Guild>>,
    pub channel: Option<Channel>,
    pub author: Member,
    /// Full command name, sub-command included (`"isolator isolate"`).
    pub name: String,
    /// Flattened option values keyed by option name.
    pub options: HashMap<String, Value>,
    ephemeral: bool,
    registration: Option<CommandRegistration>,
    answered: AtomicBool,
}

impl SlashCommandInteraction {
    /// Resolve an interaction payload. `None` when the payload carries no
    /// author at all (logged, abandoned).
    pub fn new(bot: Arc<Bot>, data: InteractionData) -> Option<Arc<Self>> {
        let author = resolve_author(&data)?;
        let guild = data.guild_id.as_deref().and_then(|id| bot.guild(id));
        let channel = match (&guild, &data.channel_id) {
            (Some(guild), Some(channel_id)) => {
                guild.channels.get(channel_id).map(|c| c.clone())
            }
            _ => None,
        };
        let (name, options) = parse_command_options(&data.data);
        let registration = bot.registry.command(&name);
        let ephemeral = registration.as_ref().is_some_and(|r| r.ephemeral);

        Some(Arc::new(Self {
            bot,
            data,
            guild,
            channel,
            author,
            name,
            options,
            ephemeral,
            registration,
            answered: AtomicBool::new(false),
        }))
    }

    /// Run the command to completion, including all failure mapping.
    pub async fn run(self: Arc<Self>) {
        let Some(registration) = self.registration.clone() else {
            error!(command = %self.name, "received unknown slash command");
            return;
        };

        debug!(command = %self.name, options = ?self.options, "running slash command");
        if registration.expensive {
            self.run_expensive().await;
        } else {
            self.run_callback().await;
        }
    }

    /// Race the handler against the acknowledgement deadline.
    async fn run_expensive(self: &Arc<Self>) {
        let elapsed = snowflake_timestamp(&self.data.id)
            .map(|created| (Utc::now() - created).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        if elapsed >= ACK_DEADLINE_SECS {
            error!(command = %self.name, elapsed, "skipping outdated interaction");
            return;
        }

        let budget = Duration::from_secs_f64((DEFER_BUDGET_SECS - elapsed).max(0.0));
        let this = self.clone();
        let mut handler = tokio::spawn(async move { this.run_callback().await });

        match tokio::time::timeout(budget, &mut handler).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => {
                error!(command = %self.name, error = %join_error, "slash command task died");
            }
            Err(_) => {
                // Budget spent: acknowledge now, let the handler finish in
                // its own time. Its reply routes as a follow-up.
                warn!(command = %self.name, "deferring slash command");
                if let Err(e) = self.defer().await {
                    self.log_failure(format!("{e}"));
                }
                if let Err(join_error) = handler.await {
                    error!(command = %self.name, error = %join_error, "slash command task died");
                }
            }
        }
    }

    /// Single outermost point of handler execution; every failure is
    /// mapped here and nothing propagates past it.
    async fn run_callback(&self) {
        let Some(registration) = &self.registration else {
            return;
        };

        match registration.handler.run(self).await {
            Ok(()) => {}
            Err(HandlerError::Command(e)) => {
                // Recognized domain failure: surfaced verbatim.
                if let Err(send_error) = self.reply(&e.to_string(), colors::RED).await {
                    self.log_failure(format!("{send_error}"));
                }
            }
            Err(HandlerError::Api(e)) if e.is_forbidden() => {
                // Usually a bot-configuration gap the issuer cannot see.
                if let Err(send_error) = self
                    .reply(
                        "Received a permission rejection from the platform API. \
                         Review the bot's server role configuration.",
                        colors::RED,
                    )
                    .await
                {
                    self.log_failure(format!("{send_error}"));
                }
                self.log_failure(format!("{e}"));
            }
            Err(HandlerError::Api(e)) => {
                // The response channel itself failed; only logging is left.
                self.log_failure(format!("{e}"));
            }
            Err(HandlerError::Unexpected(e)) => {
                if let Err(send_error) = self.reply(&format!("RuntimeError: {e}"), colors::RED).await
                {
                    self.log_failure(format!("{send_error}"));
                }
                self.log_failure(format!("{e:#}"));
            }
        }
    }

    // ── Reply surface ───────────────────────────────────────────────

    /// Send a color-coded embed reply, honoring the command's ephemeral
    /// preference. Routes as follow-up once the initial response is out.
    pub async fn reply(&self, content: &str, color: u32) -> Result<(), ApiError> {
        self.send_response(json!({
            "flags": if self.ephemeral { EPHEMERAL_FLAG } else { 0 },
            "embeds": [{
                "type": "rich",
                "color": color,
                "description": content,
            }],
        }))
        .await
    }

    /// Send caller-built message fields verbatim.
    pub async fn reply_raw(&self, data: Value) -> Result<(), ApiError> {
        self.send_response(data).await
    }

    /// Look up a member resolved by the platform for an option value.
    pub fn resolved_member(&self, user_id: &str) -> Option<Member> {
        let member = self.data.data.resolved.members.get(user_id)?;
        let user = self.data.data.resolved.users.get(user_id)?;
        Some(Member::from_parts(user, Some(member)))
    }

    pub fn is_answered(&self) -> bool {
        self.answered.load(Ordering::SeqCst)
    }

    /// Exactly one initial response per interaction; everything after the
    /// first goes out as a follow-up message.
    async fn send_response(&self, data: Value) -> Result<(), ApiError> {
        if self.answered.swap(true, Ordering::SeqCst) {
            debug!(command = %self.name, "sending follow-up");
            return self.send_followup(data).await;
        }

        let path = format!(
            "/interactions/{}/{}/callback",
            self.data.id, self.data.token
        );
        self.bot
            .api
            .request(
                Method::POST,
                &path,
                Some(json!({"type": RESPONSE_CHANNEL_MESSAGE, "data": data})),
            )
            .await
            .map(|_| ())
    }

    /// Minimal deferred acknowledgement. A no-op when the handler answered
    /// in the meantime — the initial response is single-use.
    async fn defer(&self) -> Result<(), ApiError> {
        if self.answered.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let path = format!(
            "/interactions/{}/{}/callback",
            self.data.id, self.data.token
        );
        let flags = if self.ephemeral { EPHEMERAL_FLAG } else { 0 };
        self.bot
            .api
            .request(
                Method::POST,
                &path,
                Some(json!({"type": RESPONSE_DEFERRED, "data": {"flags": flags}})),
            )
            .await
            .map(|_| ())
    }

    async fn send_followup(&self, data: Value) -> Result<(), ApiError> {
        let path = format!(
            "/webhooks/{}/{}",
            self.data.application_id, self.data.token
        );
        self.bot
            .api
            .request(Method::POST, &path, Some(data))
            .await
            .map(|_| ())
    }

    fn log_failure(&self, error: String) {
        let guild = self
            .guild
            .as_ref()
            .map(|g| format!("{} ({})", g.name(), g.id))
            .unwrap_or_else(|| "-".into());
        error!(
            command = %self.name,
            %guild,
            member = %format!("{} ({})", self.author.display_name, self.author.id),
            options = ?self.options,
            %error,
            "error processing slash command",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{command_interaction, guild_data, test_bot_with_api, RecordingApi};
    use crate::engine::dispatch::dispatch;
    use crate::engine::events::GatewayEvent;

    #[tokio::test]
    async fn test_resolution_against_replica() {
        let (bot, _api) = test_bot_with_api(RecordingApi::ok());
        let mut snapshot = guild_data("10", "O", vec![], vec![]);
        snapshot.channels = vec![crate::testutil::channel_data("30", "10", "general")];
        dispatch(&bot, GatewayEvent::GuildCreate(snapshot));

        let data = command_interaction("10", "ping", serde_json::json!([]));
        let interaction = SlashCommandInteraction::new(bot, data).unwrap();

        assert!(interaction.guild.is_some());
        assert_eq!(interaction.channel.as_ref().unwrap().name, "general");
        assert_eq!(interaction.author.id, "1");
        assert!(!interaction.is_answered());
    }

    #[tokio::test]
    async fn test_unknown_guild_resolves_to_none() {
        let (bot, _api) = test_bot_with_api(RecordingApi::ok());
        let data = command_interaction("404", "ping", serde_json::json!([]));
        let interaction = SlashCommandInteraction::new(bot, data).unwrap();
        assert!(interaction.guild.is_none());
        assert!(interaction.channel.is_none());
    }

    #[tokio::test]
    async fn test_resolved_member_joins_users_and_members() {
        let (bot, _api) = test_bot_with_api(RecordingApi::ok());
        let mut data = command_interaction("10", "whois", serde_json::json!([]));
        data.data.resolved = serde_json::from_value(serde_json::json!({
            "members": {"55": {"nick": "Vee", "roles": ["7"]}},
            "users": {"55": {"id": "55", "username": "vera"}},
        }))
        .unwrap();
        let interaction = SlashCommandInteraction::new(bot, data).unwrap();

        let member = interaction.resolved_member("55").unwrap();
        assert_eq!(member.display_name, "Vee");
        assert_eq!(member.roles, vec!["7"]);
        assert!(interaction.resolved_member("56").is_none());
    }
}
