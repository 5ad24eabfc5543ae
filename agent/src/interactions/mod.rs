//! Inbound interaction handling.
//!
//! One short-lived object wraps each interaction, resolves its targets
//! against the replica, and drives the acknowledgement protocol. Nothing
//! here survives past the final response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::colors;
use crate::engine::events::{CommandData, CommandOption, InteractionData, OPTION_KIND_SUB_COMMAND};
use crate::engine::objects::Member;
use crate::http::Api;

pub mod slash_autocomplete;
pub mod slash_command;

pub use slash_autocomplete::SlashAutocompleteInteraction;
pub use slash_command::SlashCommandInteraction;

/// Interaction response types on the wire.
pub(crate) const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub(crate) const RESPONSE_DEFERRED: u8 = 5;
pub(crate) const RESPONSE_AUTOCOMPLETE: u8 = 8;

/// Message flag marking a response visible only to the invoker.
pub(crate) const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Platform cap on autocomplete choices per response.
pub const MAX_AUTOCOMPLETE_CHOICES: usize = 25;

/// Epoch offset of platform snowflake ids, in milliseconds.
const SNOWFLAKE_EPOCH_MS: u64 = 1_420_070_400_000;

/// When an interaction was created, recovered from its snowflake id.
pub fn snowflake_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let id: u64 = id.parse().ok()?;
    DateTime::from_timestamp_millis(((id >> 22) + SNOWFLAKE_EPOCH_MS) as i64)
}

/// Parse the full command name and the flattened option map.
///
/// A payload carries at most one grouping (sub-command) option; when
/// present, its name extends the command name and only its nested options
/// make up the map.
pub(crate) fn parse_command_options(data: &CommandData) -> (String, HashMap<String, Value>) {
    if let Some(group) = data
        .options
        .iter()
        .find(|o| o.kind == OPTION_KIND_SUB_COMMAND)
    {
        let name = format!("{} {}", data.name, group.name);
        let options = group
            .options
            .iter()
            .map(|o| (o.name.clone(), o.value.clone()))
            .collect();
        return (name, options);
    }

    let options = data
        .options
        .iter()
        .map(|o| (o.name.clone(), o.value.clone()))
        .collect();
    (data.name.clone(), options)
}

/// Locate the focused option: top level first, then one level into
/// sub-command options. `None` when the payload carries no focused option.
pub(crate) fn find_focused_option(options: &[CommandOption]) -> Option<&CommandOption> {
    for option in options {
        if option.focused {
            return Some(option);
        }
        if let Some(sub) = option.options.iter().find(|o| o.focused) {
            return Some(sub);
        }
    }
    None
}

/// Author of the interaction, from the embedded membership snapshot with a
/// fallback to the bare user object (direct invocations carry no member).
pub(crate) fn resolve_author(data: &InteractionData) -> Option<Member> {
    if let Some(member) = &data.member
        && let Some(author) = Member::from_api(member)
    {
        return Some(author);
    }
    if let Some(user) = &data.user {
        return Some(Member::from_parts(user, None));
    }
    warn!(interaction_id = %data.id, "interaction without author information");
    None
}

/// Synthetic reply for interactions arriving before the replica is
/// complete. Sent directly, outside the handler error taxonomy.
pub(crate) async fn respond_unavailable(api: &dyn Api, data: &InteractionData) {
    let path = format!("/interactions/{}/{}/callback", data.id, data.token);
    let body = json!({
        "type": RESPONSE_CHANNEL_MESSAGE,
        "data": {
            "flags": EPHEMERAL_FLAG,
            "embeds": [{
                "type": "rich",
                "color": colors::YELLOW,
                "description": "Service is temporarily unavailable, please try again in a moment.",
            }],
        },
    });
    if let Err(e) = api.request(Method::POST, &path, Some(body)).await {
        error!(interaction_id = %data.id, error = %e, "failed to send unavailable response");
    }
}
