//! Shared test fixtures: payload builders and a scripted recording API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::BotConfig;
use crate::engine::bot::Bot;
use crate::engine::events::{
    ChannelData, GatewayEvent, GuildData, InteractionData, MemberData, PresenceData, RoleData,
    ThreadData, ThreadMetadata, UserData, UserRef,
};
use crate::engine::guild::Guild;
use crate::engine::objects::PresenceStatus;
use crate::http::{Api, ApiError, ApiResponse};

// ── Payload builders ────────────────────────────────────────────────

pub fn user_data(id: &str, username: &str, global_name: Option<&str>) -> UserData {
    UserData {
        id: id.to_string(),
        username: username.to_string(),
        global_name: global_name.map(str::to_string),
        bot: false,
        avatar: None,
    }
}

pub fn member_data(
    id: &str,
    username: &str,
    global_name: Option<&str>,
    nick: Option<&str>,
    roles: &[&str],
) -> MemberData {
    MemberData {
        guild_id: None,
        user: Some(user_data(id, username, global_name)),
        nick: nick.map(str::to_string),
        avatar: None,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn role_data(id: &str, name: &str, permissions: &str) -> RoleData {
    RoleData {
        id: id.to_string(),
        name: name.to_string(),
        permissions: permissions.to_string(),
    }
}

pub fn channel_data(id: &str, guild_id: &str, name: &str) -> ChannelData {
    ChannelData {
        id: id.to_string(),
        guild_id: Some(guild_id.to_string()),
        kind: 0,
        name: name.to_string(),
    }
}

pub fn thread_data(id: &str, guild_id: &str, name: &str, archived: bool) -> ThreadData {
    ThreadData {
        id: id.to_string(),
        guild_id: Some(guild_id.to_string()),
        kind: 11,
        name: name.to_string(),
        thread_metadata: ThreadMetadata { archived },
    }
}

pub fn channel_event(tag: &str, id: &str, guild_id: &str, name: &str) -> GatewayEvent {
    serde_json::from_value(json!({
        "t": tag,
        "d": {"id": id, "guild_id": guild_id, "type": 0, "name": name},
    }))
    .unwrap()
}

pub fn presence_data(guild_id: &str, user_id: &str, status: PresenceStatus) -> PresenceData {
    PresenceData {
        guild_id: Some(guild_id.to_string()),
        user: UserRef {
            id: user_id.to_string(),
        },
        status,
    }
}

pub fn guild_data(
    id: &str,
    owner_id: &str,
    roles: Vec<RoleData>,
    members: Vec<MemberData>,
) -> GuildData {
    GuildData {
        id: id.to_string(),
        name: format!("guild-{id}"),
        owner_id: owner_id.to_string(),
        icon: None,
        roles,
        members,
        presences: Vec::new(),
        channels: Vec::new(),
        threads: Vec::new(),
    }
}

/// A snowflake whose embedded timestamp is `at`.
pub fn snowflake_at(at: DateTime<Utc>) -> String {
    let ms = at.timestamp_millis() as u64 - 1_420_070_400_000;
    (ms << 22).to_string()
}

/// A command interaction created "now", invoked by member 1 in channel 30.
pub fn command_interaction(guild_id: &str, name: &str, options: Value) -> InteractionData {
    serde_json::from_value(json!({
        "id": snowflake_at(Utc::now()),
        "application_id": "app-1",
        "token": "tok-1",
        "type": 2,
        "guild_id": guild_id,
        "channel_id": "30",
        "member": {"user": {"id": "1", "username": "kira"}, "roles": ["5"]},
        "data": {"name": name, "options": options},
    }))
    .unwrap()
}

/// An autocomplete interaction with one focused option.
pub fn autocomplete_interaction(
    guild_id: &str,
    command: &str,
    option: &str,
    partial: &str,
) -> InteractionData {
    serde_json::from_value(json!({
        "id": snowflake_at(Utc::now()),
        "application_id": "app-1",
        "token": "tok-1",
        "type": 4,
        "guild_id": guild_id,
        "channel_id": "30",
        "member": {"user": {"id": "1", "username": "kira"}, "roles": ["5"]},
        "data": {
            "name": command,
            "options": [{"name": option, "type": 3, "value": partial, "focused": true}],
        },
    }))
    .unwrap()
}

// ── Bot / guild fixtures ────────────────────────────────────────────

/// Opt-in log output for test runs (`RUST_LOG=debug cargo test`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.bot.token = "test-token".into();
    config.bot.owner_ids = vec!["900".into()];
    config
}

pub fn test_bot() -> Arc<Bot> {
    test_bot_with_api(RecordingApi::ok()).0
}

pub fn test_bot_with_api(api: Arc<RecordingApi>) -> (Arc<Bot>, Arc<RecordingApi>) {
    init_tracing();
    let bot = Arc::new(Bot::new(test_config(), api.clone()));
    (bot, api)
}

/// A standalone guild replica with its own notification channel.
pub fn test_guild(data: &GuildData) -> Guild {
    let (tx, _) = broadcast::channel(64);
    Guild::from_snapshot(data, vec!["900".into()], tx)
}

// ── Recording API ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub at: Instant,
}

#[derive(Clone)]
enum Scripted {
    Ok(Value),
    Err(u16),
}

/// [`Api`] double that records every request and answers from a script,
/// defaulting to an empty success.
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    scripted: Mutex<HashMap<String, Scripted>>,
    default: Scripted,
}

impl RecordingApi {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            default: Scripted::Ok(Value::Null),
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            default: Scripted::Err(status),
        })
    }

    /// Answer `path` with `body` instead of the default.
    pub fn script(&self, path: &str, body: Value) {
        self.scripted
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Ok(body));
    }

    /// Fail `path` with `status` instead of the default.
    pub fn script_error(&self, path: &str, status: u16) {
        self.scripted
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Err(status));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path_fragment: &str) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path.contains(path_fragment))
            .collect()
    }
}

#[async_trait]
impl Api for RecordingApi {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.calls.lock().unwrap().push(ApiCall {
            method: method.clone(),
            path: path.to_string(),
            body,
            at: Instant::now(),
        });

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match scripted {
            Scripted::Ok(value) => Ok(ApiResponse {
                status: 200,
                body: value,
            }),
            Scripted::Err(status) => Err(ApiError::Status {
                status,
                method,
                path: path.to_string(),
                body: String::new(),
            }),
        }
    }
}
