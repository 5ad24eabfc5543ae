//! Passive entity records held by the guild replica.
//!
//! These are plain data mutated in place by the replica; they carry no
//! behavior beyond field upkeep. Construction happens from gateway payloads
//! (`from_api`), mutation through `update` with the same payload shape.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::events::{ChannelData, MemberData, PresenceData, RoleData, ThreadData, UserData};

bitflags! {
    /// Role permission bitfield.
    ///
    /// The platform serializes this as a decimal string because its bit
    /// space outgrew double-precision integers; parsed into the full
    /// 128-bit space so no defined bit is ever truncated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u128 {
        const ADMINISTRATOR = 1 << 3;

        const _ = !0;
    }
}

impl Permissions {
    /// Parse the platform's decimal-string bitmask. Unparsable input is
    /// treated as no permissions and logged.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u128>() {
            Ok(bits) => Self::from_bits_retain(bits),
            Err(_) => {
                warn!(%raw, "unparsable permission bitmask");
                Self::empty()
            }
        }
    }
}

/// A guild role.
#[derive(Debug, Clone)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Permissions,
}

impl Role {
    pub fn from_api(data: &RoleData) -> Self {
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            permissions: Permissions::parse(&data.permissions),
        }
    }

    pub fn update(&mut self, data: &RoleData) {
        self.name = data.name.clone();
        self.permissions = Permissions::parse(&data.permissions);
    }
}

/// A guild channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    /// Platform channel-type discriminant.
    pub kind: u8,
    pub name: String,
}

impl Channel {
    pub fn from_api(data: &ChannelData) -> Self {
        Self {
            id: data.id.clone(),
            kind: data.kind,
            name: data.name.clone(),
        }
    }

    pub fn update(&mut self, data: &ChannelData) {
        self.kind = data.kind;
        self.name = data.name.clone();
    }
}

/// A thread under a guild channel.
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: String,
    pub name: String,
    pub kind: u8,
    pub archived: bool,
}

impl Thread {
    pub fn from_api(data: &ThreadData) -> Self {
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            kind: data.kind,
            archived: data.thread_metadata.archived,
        }
    }

    pub fn update(&mut self, data: &ThreadData) {
        self.name = data.name.clone();
        self.archived = data.thread_metadata.archived;
    }
}

/// A guild member.
///
/// `display_name` is the effective name: nickname, else global display
/// name, else username. `fake` marks a placeholder for a user the replica
/// never saw; fake members carry only id and username.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    pub display_name: String,
    pub bot: bool,
    pub avatar: Option<String>,
    pub roles: Vec<String>,
    pub fake: bool,
    /// Collaborator-managed free-form status; not delivered with member data.
    pub status: Option<String>,
}

impl Member {
    pub fn from_parts(user: &UserData, member: Option<&MemberData>) -> Self {
        let nick = member.and_then(|m| m.nick.clone());
        let display_name = nick
            .clone()
            .or_else(|| user.global_name.clone())
            .unwrap_or_else(|| user.username.clone());

        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            global_name: user.global_name.clone(),
            display_name,
            bot: user.bot,
            avatar: member
                .and_then(|m| m.avatar.clone())
                .or_else(|| user.avatar.clone()),
            roles: member.map(|m| m.roles.clone()).unwrap_or_default(),
            fake: false,
            status: None,
        }
    }

    /// Build from a gateway member payload. `None` when the payload carries
    /// no user object (partial member inside resolved data).
    pub fn from_api(data: &MemberData) -> Option<Self> {
        data.user.as_ref().map(|user| Self::from_parts(user, Some(data)))
    }

    /// Placeholder for a user absent from the replica.
    pub fn fake(user_id: &str, username: &str) -> Self {
        Self {
            id: user_id.to_string(),
            username: username.to_string(),
            global_name: Some(username.to_string()),
            display_name: username.to_string(),
            bot: false,
            avatar: None,
            roles: Vec::new(),
            fake: true,
            status: None,
        }
    }

    pub fn update(&mut self, data: &MemberData) {
        if let Some(user) = &data.user {
            self.username = user.username.clone();
            self.global_name = user.global_name.clone();
            self.avatar = data.avatar.clone().or_else(|| user.avatar.clone());
        }
        self.display_name = data
            .nick
            .clone()
            .or_else(|| self.global_name.clone())
            .unwrap_or_else(|| self.username.clone());
        self.roles = data.roles.clone();
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = Some(status.to_string());
    }

    pub fn mention(&self) -> String {
        if self.fake {
            format!("<{}@{}>", self.username, self.id)
        } else {
            format!("<@{}>", self.id)
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Offline,
}

/// A member's presence and when it began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub status: PresenceStatus,
    pub at: DateTime<Utc>,
}

impl Presence {
    pub fn from_api(data: &PresenceData) -> Self {
        Self {
            status: data.status,
            at: Utc::now(),
        }
    }

    /// Backfill value for members the snapshot carried no presence for;
    /// large guilds omit offline members from the presence list.
    pub fn offline() -> Self {
        Self {
            status: PresenceStatus::Offline,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{member_data, user_data};

    #[test]
    fn test_permissions_parse_admin_bit() {
        assert!(Permissions::parse("8").contains(Permissions::ADMINISTRATOR));
        assert!(!Permissions::parse("7").contains(Permissions::ADMINISTRATOR));
        assert!(Permissions::parse("0").is_empty());
    }

    #[test]
    fn test_permissions_parse_does_not_truncate() {
        // Bit 100 plus the administrator bit — far beyond 64-bit range.
        let raw = ((1u128 << 100) | (1 << 3)).to_string();
        let perms = Permissions::parse(&raw);
        assert!(perms.contains(Permissions::ADMINISTRATOR));
        assert_eq!(perms.bits(), (1u128 << 100) | (1 << 3));
    }

    #[test]
    fn test_permissions_parse_garbage_is_empty() {
        assert!(Permissions::parse("not-a-number").is_empty());
        assert!(Permissions::parse("").is_empty());
    }

    #[test]
    fn test_member_display_name_fallbacks() {
        let m = Member::from_api(&member_data("1", "tessa", Some("Tess"), Some("Tessie"), &[]))
            .unwrap();
        assert_eq!(m.display_name, "Tessie");

        let m = Member::from_api(&member_data("1", "tessa", Some("Tess"), None, &[])).unwrap();
        assert_eq!(m.display_name, "Tess");

        let m = Member::from_api(&member_data("1", "tessa", None, None, &[])).unwrap();
        assert_eq!(m.display_name, "tessa");
    }

    #[test]
    fn test_member_update_recomputes_display_name() {
        let mut m =
            Member::from_api(&member_data("1", "tessa", Some("Tess"), Some("Tessie"), &[]))
                .unwrap();

        let mut data = member_data("1", "tessa", Some("Tess"), None, &["55"]);
        data.nick = None;
        m.update(&data);

        assert_eq!(m.display_name, "Tess");
        assert_eq!(m.roles, vec!["55"]);
    }

    #[test]
    fn test_member_equality_is_by_id() {
        let a = Member::from_api(&member_data("1", "tessa", None, None, &["5"])).unwrap();
        let b = Member::fake("1", "someone-else");
        let c = Member::fake("2", "tessa");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mention_rendering() {
        let real = Member::from_parts(&user_data("42", "kira", None), None);
        assert_eq!(real.mention(), "<@42>");

        let fake = Member::fake("42", "kira");
        assert_eq!(fake.mention(), "<kira@42>");
    }

    #[test]
    fn test_fake_member_shape() {
        let m = Member::fake("9", "ghost");
        assert!(m.fake);
        assert!(m.roles.is_empty());
        assert_eq!(m.display_name, "ghost");
    }

    #[test]
    fn test_status_survives_member_update() {
        let mut m = Member::from_api(&member_data("1", "tessa", None, None, &[])).unwrap();
        assert!(m.status.is_none());

        m.set_status("afk");
        m.update(&member_data("1", "tessa", None, None, &["5"]));
        assert_eq!(m.status.as_deref(), Some("afk"));
    }

    #[test]
    fn test_presence_status_serde_names() {
        let s: PresenceStatus = serde_json::from_str("\"dnd\"").unwrap();
        assert_eq!(s, PresenceStatus::Dnd);
        assert_eq!(serde_json::to_string(&PresenceStatus::Offline).unwrap(), "\"offline\"");
    }
}
