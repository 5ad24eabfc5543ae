//! Autocomplete interaction handling.
//!
//! Autocomplete requests carry a focused option; the handler registered
//! for that option name produces the choices. The platform caps a response
//! at 25 choices, so the list is always truncated before it goes out.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::{
    MAX_AUTOCOMPLETE_CHOICES, RESPONSE_AUTOCOMPLETE, find_focused_option, resolve_author,
};
use crate::engine::bot::Bot;
use crate::engine::events::InteractionData;
use crate::engine::guild::Guild;
use crate::engine::objects::Member;
use crate::registry::AutocompleteHandler;

/// One inbound autocomplete request.
pub struct SlashAutocompleteInteraction {
    pub bot: Arc<Bot>,
    pub data: InteractionData,
    pub guild: Option<Arc<Guild>>,
    pub author: Member,
    /// Name of the focused option.
    pub option: String,
    /// Current partial value of the focused option.
    pub value: Value,
    handler: Option<Arc<dyn AutocompleteHandler>>,
}

impl SlashAutocompleteInteraction {
    /// Resolve an autocomplete payload. `None` when no option is focused
    /// or the payload carries no author (logged, abandoned).
    pub fn new(bot: Arc<Bot>, data: InteractionData) -> Option<Arc<Self>> {
        let author = resolve_author(&data)?;
        let Some(focused) = find_focused_option(&data.data.options) else {
            warn!(interaction_id = %data.id, "autocomplete without a focused option");
            return None;
        };

        let option = focused.name.clone();
        let value = focused.value.clone();
        let guild = data.guild_id.as_deref().and_then(|id| bot.guild(id));
        let handler = bot.registry.autocomplete(&option);

        Some(Arc::new(Self {
            bot,
            data,
            guild,
            author,
            option,
            value,
            handler,
        }))
    }

    /// Produce and send the choice list. Handler failures degrade to an
    /// empty list; autocomplete is never worth a user-visible error.
    pub async fn answer(self: Arc<Self>) {
        let mut choices = match &self.handler {
            Some(handler) => match handler.suggest(&self).await {
                Ok(choices) => choices,
                Err(e) => {
                    error!(option = %self.option, error = %e, "autocomplete handler failed");
                    Vec::new()
                }
            },
            None => {
                debug!(option = %self.option, "no autocomplete handler registered");
                Vec::new()
            }
        };

        if choices.len() > MAX_AUTOCOMPLETE_CHOICES {
            choices.truncate(MAX_AUTOCOMPLETE_CHOICES);
        }

        let path = format!(
            "/interactions/{}/{}/callback",
            self.data.id, self.data.token
        );
        let body = json!({
            "type": RESPONSE_AUTOCOMPLETE,
            "data": {"choices": choices},
        });
        if let Err(e) = self.bot.api.request(Method::POST, &path, Some(body)).await {
            error!(option = %self.option, error = %e, "failed to answer autocomplete");
        }
    }
}
