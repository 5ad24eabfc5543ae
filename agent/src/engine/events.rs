//! Typed gateway events and their payload shapes.
//!
//! The transport collaborator decodes gateway frames into [`GatewayEvent`]
//! and feeds them to [`crate::engine::dispatch::serve`] in per-guild arrival
//! order. Tags the core does not know deserialize to `Unknown` and are
//! dropped, never treated as errors.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::objects::PresenceStatus;

/// One event off the gateway stream, tagged the way the platform tags
/// dispatch frames.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(ReadyData),
    Resumed(Value),
    GuildCreate(GuildData),
    GuildUpdate(GuildData),
    GuildDelete(GuildDeleteData),
    ChannelCreate(ChannelData),
    ChannelUpdate(ChannelData),
    ChannelDelete(ChannelData),
    ThreadCreate(ThreadData),
    ThreadUpdate(ThreadData),
    GuildMemberAdd(MemberData),
    GuildMemberUpdate(MemberData),
    GuildMemberRemove(MemberRemoveData),
    GuildRoleCreate(RoleEventData),
    GuildRoleUpdate(RoleEventData),
    GuildRoleDelete(RoleDeleteData),
    PresenceUpdate(PresenceData),
    InteractionCreate(InteractionData),
    /// Synthesized by the transport when a shard connection drops.
    ShardDisconnect(ShardDisconnectData),
    Unknown,
}

// Derived adjacently-tagged deserialization (`#[serde(tag = "t", content =
// "d")]`) can't express "unknown tag with arbitrary content deserializes to
// a unit variant" — serde requires the `Unknown` payload to deserialize as
// unit, which fails whenever `d` is a map. Decode the envelope by hand so
// unrecognized tags fall back to `Unknown` regardless of their content.
impl<'de> Deserialize<'de> for GatewayEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            t: String,
            #[serde(default)]
            d: Value,
        }

        let Envelope { t, d } = Envelope::deserialize(deserializer)?;
        use serde::de::Error as _;

        Ok(match t.as_str() {
            "READY" => GatewayEvent::Ready(serde_json::from_value(d).map_err(D::Error::custom)?),
            "RESUMED" => GatewayEvent::Resumed(d),
            "GUILD_CREATE" => {
                GatewayEvent::GuildCreate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_UPDATE" => {
                GatewayEvent::GuildUpdate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_DELETE" => {
                GatewayEvent::GuildDelete(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "CHANNEL_CREATE" => {
                GatewayEvent::ChannelCreate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "CHANNEL_UPDATE" => {
                GatewayEvent::ChannelUpdate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "CHANNEL_DELETE" => {
                GatewayEvent::ChannelDelete(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "THREAD_CREATE" => {
                GatewayEvent::ThreadCreate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "THREAD_UPDATE" => {
                GatewayEvent::ThreadUpdate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_MEMBER_ADD" => {
                GatewayEvent::GuildMemberAdd(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_MEMBER_UPDATE" => GatewayEvent::GuildMemberUpdate(
                serde_json::from_value(d).map_err(D::Error::custom)?,
            ),
            "GUILD_MEMBER_REMOVE" => GatewayEvent::GuildMemberRemove(
                serde_json::from_value(d).map_err(D::Error::custom)?,
            ),
            "GUILD_ROLE_CREATE" => {
                GatewayEvent::GuildRoleCreate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_ROLE_UPDATE" => {
                GatewayEvent::GuildRoleUpdate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "GUILD_ROLE_DELETE" => {
                GatewayEvent::GuildRoleDelete(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "PRESENCE_UPDATE" => {
                GatewayEvent::PresenceUpdate(serde_json::from_value(d).map_err(D::Error::custom)?)
            }
            "INTERACTION_CREATE" => GatewayEvent::InteractionCreate(
                serde_json::from_value(d).map_err(D::Error::custom)?,
            ),
            "SHARD_DISCONNECT" => GatewayEvent::ShardDisconnect(
                serde_json::from_value(d).map_err(D::Error::custom)?,
            ),
            _ => GatewayEvent::Unknown,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyData {
    pub user: UserData,
    /// Guilds the session belongs to; their snapshots follow as
    /// GUILD_CREATE events.
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Full guild snapshot (GUILD_CREATE) or partial guild update
/// (GUILD_UPDATE, which carries no members/channels/presences).
#[derive(Debug, Clone, Deserialize)]
pub struct GuildData {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleData>,
    #[serde(default)]
    pub members: Vec<MemberData>,
    #[serde(default)]
    pub presences: Vec<PresenceData>,
    #[serde(default)]
    pub channels: Vec<ChannelData>,
    #[serde(default)]
    pub threads: Vec<ThreadData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildDeleteData {
    pub id: String,
    /// Set when the guild went away because of an outage rather than the
    /// bot being removed.
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleData {
    pub id: String,
    pub name: String,
    /// Decimal-string permission bitmask.
    pub permissions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleEventData {
    pub guild_id: String,
    pub role: RoleData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleDeleteData {
    pub guild_id: String,
    pub role_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelData {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadData {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thread_metadata: ThreadMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberData {
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Absent on partial members inside resolved interaction data.
    #[serde(default)]
    pub user: Option<UserData>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRemoveData {
    pub guild_id: String,
    pub user: UserData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceData {
    #[serde(default)]
    pub guild_id: Option<String>,
    pub user: UserRef,
    pub status: PresenceStatus,
}

/// The presence payload carries only a partial user; the id is all the
/// replica needs.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShardDisconnectData {
    /// True when no connected shards remain.
    #[serde(default)]
    pub all_down: bool,
}

/// One inbound interaction (slash command or autocomplete request).
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionData {
    pub id: String,
    pub application_id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub member: Option<MemberData>,
    #[serde(default)]
    pub user: Option<UserData>,
    #[serde(default)]
    pub data: CommandData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub resolved: ResolvedData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub focused: bool,
}

/// Entities the platform resolved for option values of the interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolvedData {
    #[serde(default)]
    pub members: HashMap<String, MemberData>,
    #[serde(default)]
    pub users: HashMap<String, UserData>,
}

/// Grouping (sub-command) option discriminant.
pub const OPTION_KIND_SUB_COMMAND: u8 = 1;

/// Interaction type discriminants the core reacts to.
pub const INTERACTION_KIND_COMMAND: u8 = 2;
pub const INTERACTION_KIND_AUTOCOMPLETE: u8 = 4;
