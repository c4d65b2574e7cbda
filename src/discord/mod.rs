//! The slice of the Discord platform the connector consumes.
//!
//! Syncers only ever talk to Discord through [`DiscordApi`]; [`client::RestClient`]
//! is the production implementation over the REST API.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

pub use client::RestClient;

// ─── Platform Types ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Nickname when set, else the account username.
    pub fn display_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.user.username,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(with = "bitmask")]
    pub permissions: u64,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub rules_channel_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    Stage,
    Forum,
    Other(u8),
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelKind::Text,
            2 => ChannelKind::Voice,
            4 => ChannelKind::Category,
            5 => ChannelKind::Announcement,
            13 => ChannelKind::Stage,
            15 => ChannelKind::Forum,
            other => ChannelKind::Other(other),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Text => 0,
            ChannelKind::Voice => 2,
            ChannelKind::Category => 4,
            ChannelKind::Announcement => 5,
            ChannelKind::Stage => 13,
            ChannelKind::Forum => 15,
            ChannelKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OverwriteKind {
    Role,
    Member,
}

impl TryFrom<u8> for OverwriteKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OverwriteKind::Role),
            1 => Ok(OverwriteKind::Member),
            other => Err(format!("unknown permission overwrite type {other}")),
        }
    }
}

impl From<OverwriteKind> for u8 {
    fn from(kind: OverwriteKind) -> Self {
        match kind {
            OverwriteKind::Role => 0,
            OverwriteKind::Member => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Role id or user id, depending on `kind`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(with = "bitmask")]
    pub allow: u64,
    #[serde(with = "bitmask")]
    pub deny: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteGuild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub code: String,
    #[serde(default)]
    pub guild: Option<InviteGuild>,
}

impl Invite {
    pub fn url(&self) -> String {
        format!("https://discord.gg/{}", self.code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InviteOptions {
    /// Lifetime in seconds.
    pub max_age: u32,
    pub max_uses: u32,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmChannel {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
}

// ─── Capability Interface ──────────────────────────────

/// Remote calls the syncers depend on. Implementations must be shareable
/// across tasks; the syncers themselves are not.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// The bot account the token authenticates as.
    async fn current_user(&self) -> AppResult<User>;

    async fn list_guilds(&self) -> AppResult<Vec<Guild>>;

    async fn guild(&self, guild_id: &str) -> AppResult<Guild>;

    async fn guild_channels(&self, guild_id: &str) -> AppResult<Vec<Channel>>;

    async fn guild_roles(&self, guild_id: &str) -> AppResult<Vec<Role>>;

    /// One page of members with user id greater than `after` (empty = from the start).
    async fn guild_members(&self, guild_id: &str, after: &str, limit: u32) -> AppResult<Vec<Member>>;

    async fn channel(&self, channel_id: &str) -> AppResult<Channel>;

    /// Effective permissions of a user in a channel, after roles and overwrites.
    async fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> AppResult<u64>;

    async fn channel_invite_create(&self, channel_id: &str, options: &InviteOptions) -> AppResult<Invite>;

    async fn user_channel_create(&self, user_id: &str) -> AppResult<DmChannel>;

    async fn channel_message_send(&self, channel_id: &str, content: &str) -> AppResult<Message>;

    async fn guild_member_delete_with_reason(
        &self,
        guild_id: &str,
        user_id: &str,
        reason: &str,
    ) -> AppResult<()>;
}

/// Discord sends 64-bit permission fields as decimal strings.
pub mod bitmask {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }
}
