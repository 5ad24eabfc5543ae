//! Per-guild state replica.
//!
//! One `Guild` exists per guild the session covers. It owns the entity
//! maps and is mutated exclusively by the event dispatcher (plus the
//! narrow on-demand member fetch); command handlers read it by cloning
//! entities out, so no guard is ever held across an await.

use std::sync::RwLock;

use dashmap::{DashMap, DashSet};
use reqwest::Method;
use tokio::sync::broadcast;
use tracing::debug;

use super::events::{GuildData, MemberData, PresenceData, RoleData};
use super::objects::{Channel, Member, Permissions, Presence, Role, Thread};
use crate::http::{Api, ApiError};

/// Notification emitted on every presence transition, before the new
/// presence lands in the replica.
#[derive(Debug, Clone)]
pub struct PresenceChange {
    pub guild_id: String,
    pub user_id: String,
    pub old: Presence,
    pub new: Presence,
}

#[derive(Debug, Clone)]
struct GuildMeta {
    name: String,
    owner_id: String,
    icon: Option<String>,
}

/// Per-guild knobs collaborators may set at runtime.
#[derive(Debug, Default, Clone)]
pub struct GuildSettings {
    /// Role treated as administrator regardless of its permission bits.
    pub admin_role: Option<String>,
}

pub struct Guild {
    pub id: String,
    meta: RwLock<GuildMeta>,
    pub roles: DashMap<String, Role>,
    pub members: DashMap<String, Member>,
    pub presences: DashMap<String, Presence>,
    pub channels: DashMap<String, Channel>,
    pub threads: DashMap<String, Thread>,
    /// Ids of currently-present roles whose bitmask carries the
    /// administrator bit. Maintained by every role mutation.
    pub admin_roles: DashSet<String>,
    settings: RwLock<GuildSettings>,
    bot_owner_ids: Vec<String>,
    presence_tx: broadcast::Sender<PresenceChange>,
}

impl Guild {
    /// Build the replica from a full guild snapshot.
    pub fn from_snapshot(
        data: &GuildData,
        bot_owner_ids: Vec<String>,
        presence_tx: broadcast::Sender<PresenceChange>,
    ) -> Self {
        debug!(guild = %data.name, "creating guild replica");

        let roles: DashMap<String, Role> = data
            .roles
            .iter()
            .map(|r| (r.id.clone(), Role::from_api(r)))
            .collect();

        let admin_roles: DashSet<String> = roles
            .iter()
            .filter(|r| r.permissions.contains(Permissions::ADMINISTRATOR))
            .map(|r| r.id.clone())
            .collect();

        let members: DashMap<String, Member> = data
            .members
            .iter()
            .filter_map(Member::from_api)
            .map(|m| (m.id.clone(), m))
            .collect();

        let presences: DashMap<String, Presence> = data
            .presences
            .iter()
            .map(|p| (p.user.id.clone(), Presence::from_api(p)))
            .collect();
        // Large guilds omit offline members from the snapshot presence list.
        for member in members.iter() {
            if !presences.contains_key(member.key()) {
                presences.insert(member.key().clone(), Presence::offline());
            }
        }

        Self {
            id: data.id.clone(),
            meta: RwLock::new(GuildMeta {
                name: data.name.clone(),
                owner_id: data.owner_id.clone(),
                icon: data.icon.clone(),
            }),
            roles,
            members,
            presences,
            channels: data
                .channels
                .iter()
                .map(|c| (c.id.clone(), Channel::from_api(c)))
                .collect(),
            threads: data
                .threads
                .iter()
                .map(|t| (t.id.clone(), Thread::from_api(t)))
                .collect(),
            admin_roles,
            settings: RwLock::new(GuildSettings::default()),
            bot_owner_ids,
            presence_tx,
        }
    }

    pub fn name(&self) -> String {
        self.meta.read().expect("guild meta lock").name.clone()
    }

    pub fn owner_id(&self) -> String {
        self.meta.read().expect("guild meta lock").owner_id.clone()
    }

    pub fn icon(&self) -> Option<String> {
        self.meta.read().expect("guild meta lock").icon.clone()
    }

    pub fn settings(&self) -> GuildSettings {
        self.settings.read().expect("guild settings lock").clone()
    }

    pub fn set_admin_role(&self, role_id: Option<String>) {
        self.settings.write().expect("guild settings lock").admin_role = role_id;
    }

    /// Apply a guild update. The payload reconciles scalar fields and
    /// roles only; channel/thread removal arrives as its own events.
    pub fn update_self(&self, data: &GuildData) {
        debug!(guild = %data.name, "updating guild replica");
        {
            let mut meta = self.meta.write().expect("guild meta lock");
            meta.name = data.name.clone();
            meta.owner_id = data.owner_id.clone();
            meta.icon = data.icon.clone();
        }

        for role_data in &data.roles {
            self.create_or_update_role(role_data);
        }
    }

    // ── Entity upserts ──────────────────────────────────────────────

    pub fn create_or_update_channel(&self, data: &super::events::ChannelData) {
        if let Some(mut channel) = self.channels.get_mut(&data.id) {
            channel.update(data);
            return;
        }
        self.channels.insert(data.id.clone(), Channel::from_api(data));
    }

    pub fn create_or_update_thread(&self, data: &super::events::ThreadData) {
        if let Some(mut thread) = self.threads.get_mut(&data.id) {
            thread.update(data);
            return;
        }
        self.threads.insert(data.id.clone(), Thread::from_api(data));
    }

    pub fn create_or_update_member(&self, data: &MemberData) {
        let Some(user) = &data.user else {
            debug!(guild = %self.id, "member payload without user object, dropped");
            return;
        };
        if let Some(mut member) = self.members.get_mut(&user.id) {
            member.update(data);
            return;
        }
        if let Some(member) = Member::from_api(data) {
            self.members.insert(member.id.clone(), member);
        }
    }

    pub fn create_or_update_role(&self, data: &RoleData) {
        if Permissions::parse(&data.permissions).contains(Permissions::ADMINISTRATOR) {
            self.admin_roles.insert(data.id.clone());
        } else {
            self.admin_roles.remove(&data.id);
        }

        if let Some(mut role) = self.roles.get_mut(&data.id) {
            role.update(data);
            return;
        }
        self.roles.insert(data.id.clone(), Role::from_api(data));
    }

    // ── Entity removal ──────────────────────────────────────────────

    /// Delete a role and strip it from every member still holding it.
    pub fn delete_role(&self, role_id: &str) {
        self.admin_roles.remove(role_id);
        for mut member in self.members.iter_mut() {
            member.roles.retain(|r| r != role_id);
        }
        self.roles.remove(role_id);
    }

    pub fn delete_channel(&self, channel_id: &str) {
        self.channels.remove(channel_id);
    }

    pub fn delete_member(&self, user_id: &str) {
        self.members.remove(user_id);
        self.presences.remove(user_id);
    }

    // ── Presence ────────────────────────────────────────────────────

    /// Record a presence transition, notifying subscribers with the prior
    /// presence before it is overwritten. Per-member ordering follows
    /// event arrival order.
    pub fn update_presence(&self, data: &PresenceData) {
        let new = Presence::from_api(data);
        // Prior presence is only absent for a member the replica has not
        // seen yet; there is no transition to report in that case.
        let old = self.presences.get(&data.user.id).map(|p| p.clone());
        if let Some(old) = old {
            let _ = self.presence_tx.send(PresenceChange {
                guild_id: self.id.clone(),
                user_id: data.user.id.clone(),
                old,
                new: new.clone(),
            });
        }
        self.presences.insert(data.user.id.clone(), new);
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Whether a member may administer this guild: the guild owner, a
    /// configured bot owner, the configured admin role, or any role whose
    /// bitmask carries the administrator bit.
    pub fn is_admin(&self, member: &Member) -> bool {
        if member.id == self.owner_id() || self.bot_owner_ids.contains(&member.id) {
            return true;
        }
        let admin_role = self.settings().admin_role;
        member
            .roles
            .iter()
            .any(|role_id| Some(role_id) == admin_role.as_ref() || self.admin_roles.contains(role_id))
    }

    /// Cached member, else exactly one API lookup that is then cached.
    /// `Ok(None)` means the user is not in the guild.
    pub async fn fetch_member(
        &self,
        user_id: &str,
        api: &dyn Api,
    ) -> Result<Option<Member>, ApiError> {
        if let Some(member) = self.members.get(user_id) {
            return Ok(Some(member.clone()));
        }

        let path = format!("/guilds/{}/members/{}", self.id, user_id);
        let response = match api.request(Method::GET, &path, None).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let data: MemberData =
            serde_json::from_value(response.body).map_err(|source| ApiError::Decode {
                path,
                source,
            })?;
        let Some(member) = Member::from_api(&data) else {
            return Ok(None);
        };

        self.members.insert(member.id.clone(), member.clone());
        Ok(Some(member))
    }
}
