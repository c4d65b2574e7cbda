#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use discord_connector::{
    build_router,
    config::AppConfig,
    connector::{Connector, SyncOptions},
    discord::{
        Channel, ChannelKind, DiscordApi, DmChannel, Guild, Invite, InviteGuild, InviteOptions,
        Member, Message, OverwriteKind, PermissionOverwrite, Role, User,
    },
    errors::{AppError, AppResult},
    permissions, AppState,
};

// ─── Builders ──────────────────────────────────────────

pub fn guild(id: &str, name: &str) -> Guild {
    Guild {
        id: id.into(),
        name: name.into(),
        description: None,
        owner_id: None,
        rules_channel_id: None,
        roles: vec![],
    }
}

pub fn role(id: &str, name: &str, permissions: u64) -> Role {
    Role {
        id: id.into(),
        name: name.into(),
        permissions,
        position: 0,
    }
}

pub fn member(id: &str, username: &str, roles: &[&str]) -> Member {
    Member {
        user: User {
            id: id.into(),
            username: username.into(),
            bot: false,
        },
        nick: None,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn channel(id: &str, name: &str, kind: ChannelKind, position: i32) -> Channel {
    Channel {
        id: id.into(),
        guild_id: None,
        kind,
        name: name.into(),
        topic: None,
        position,
        member_count: None,
        permission_overwrites: vec![],
    }
}

pub fn role_overwrite(role_id: &str, allow: u64, deny: u64) -> PermissionOverwrite {
    PermissionOverwrite {
        id: role_id.into(),
        kind: OverwriteKind::Role,
        allow,
        deny,
    }
}

pub fn member_overwrite(user_id: &str, allow: u64, deny: u64) -> PermissionOverwrite {
    PermissionOverwrite {
        id: user_id.into(),
        kind: OverwriteKind::Member,
        allow,
        deny,
    }
}

/// Numeric-string ordering, as Discord orders snowflakes.
fn snowflake_after(id: &str, after: &str) -> bool {
    after.is_empty() || (id.len(), id) > (after.len(), after)
}

// ─── Fake Discord ──────────────────────────────────────

#[derive(Default)]
struct FakeState {
    guilds: Vec<Guild>,
    channels: HashMap<String, Vec<Channel>>,
    members: HashMap<String, Vec<Member>>,
    calls: Vec<String>,
    invites: Vec<(String, InviteOptions)>,
    messages: Vec<(String, String)>,
    removed: Vec<(String, String, String)>,
    fail_dm: bool,
}

/// In-memory [`DiscordApi`] that records every call it receives.
#[derive(Default)]
pub struct FakeDiscord {
    state: Mutex<FakeState>,
}

impl FakeDiscord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guild(self, guild: Guild) -> Self {
        self.state.lock().unwrap().guilds.push(guild);
        self
    }

    /// Roles are stored on the guild, as Discord returns them.
    pub fn with_roles(self, guild_id: &str, roles: Vec<Role>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let guild = state
                .guilds
                .iter_mut()
                .find(|g| g.id == guild_id)
                .expect("add the guild before its roles");
            guild.roles.extend(roles);
        }
        self
    }

    pub fn with_channels(self, guild_id: &str, channels: Vec<Channel>) -> Self {
        let channels = channels
            .into_iter()
            .map(|mut c| {
                c.guild_id = Some(guild_id.to_string());
                c
            })
            .collect::<Vec<_>>();
        self.state
            .lock()
            .unwrap()
            .channels
            .entry(guild_id.to_string())
            .or_default()
            .extend(channels);
        self
    }

    pub fn with_members(self, guild_id: &str, members: Vec<Member>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let list = state.members.entry(guild_id.to_string()).or_default();
            list.extend(members);
            list.sort_by(|a, b| (a.user.id.len(), &a.user.id).cmp(&(b.user.id.len(), &b.user.id)));
        }
        self
    }

    pub fn failing_dm(self) -> Self {
        self.state.lock().unwrap().fail_dm = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    // ─── Inspection ─────────────────────────────────

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls whose name starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn invites(&self) -> Vec<(String, InviteOptions)> {
        self.state.lock().unwrap().invites.clone()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn removed(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().removed.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn find_guild(&self, guild_id: &str) -> AppResult<Guild> {
        self.state
            .lock()
            .unwrap()
            .guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("guild {guild_id}")))
    }

    fn find_channel(&self, channel_id: &str) -> AppResult<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .values()
            .flatten()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("channel {channel_id}")))
    }

    fn find_member(&self, guild_id: &str, user_id: &str) -> AppResult<Member> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(guild_id)
            .and_then(|members| members.iter().find(|m| m.user.id == user_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("member {user_id}")))
    }
}

#[async_trait]
impl DiscordApi for FakeDiscord {
    async fn current_user(&self) -> AppResult<User> {
        self.record("current_user".into());
        Ok(User {
            id: "1".into(),
            username: "connector-bot".into(),
            bot: true,
        })
    }

    async fn list_guilds(&self) -> AppResult<Vec<Guild>> {
        self.record("list_guilds".into());
        Ok(self.state.lock().unwrap().guilds.clone())
    }

    async fn guild(&self, guild_id: &str) -> AppResult<Guild> {
        self.record(format!("guild {guild_id}"));
        self.find_guild(guild_id)
    }

    async fn guild_channels(&self, guild_id: &str) -> AppResult<Vec<Channel>> {
        self.record(format!("guild_channels {guild_id}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .get(guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn guild_roles(&self, guild_id: &str) -> AppResult<Vec<Role>> {
        self.record(format!("guild_roles {guild_id}"));
        Ok(self.find_guild(guild_id)?.roles)
    }

    async fn guild_members(&self, guild_id: &str, after: &str, limit: u32) -> AppResult<Vec<Member>> {
        self.record(format!("guild_members {guild_id} after={after}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .members
            .get(guild_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| snowflake_after(&m.user.id, after))
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn channel(&self, channel_id: &str) -> AppResult<Channel> {
        self.record(format!("channel {channel_id}"));
        self.find_channel(channel_id)
    }

    async fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> AppResult<u64> {
        self.record(format!("user_channel_permissions {user_id} {channel_id}"));
        let channel = self.find_channel(channel_id)?;
        let guild_id = channel.guild_id.clone().unwrap_or_default();
        let guild = self.find_guild(&guild_id)?;
        let member = self.find_member(&guild_id, user_id)?;
        Ok(permissions::compute_channel_permissions(&guild, &member, &channel))
    }

    async fn channel_invite_create(&self, channel_id: &str, options: &InviteOptions) -> AppResult<Invite> {
        self.record(format!("channel_invite_create {channel_id}"));
        let guild = self
            .find_channel(channel_id)
            .ok()
            .and_then(|c| c.guild_id)
            .and_then(|id| self.find_guild(&id).ok())
            .map(|g| InviteGuild { id: g.id, name: g.name });

        let mut state = self.state.lock().unwrap();
        state.invites.push((channel_id.to_string(), options.clone()));
        Ok(Invite {
            code: format!("code{}", state.invites.len()),
            guild,
        })
    }

    async fn user_channel_create(&self, user_id: &str) -> AppResult<DmChannel> {
        self.record(format!("user_channel_create {user_id}"));
        if self.state.lock().unwrap().fail_dm {
            return Err(AppError::Upstream {
                status: 403,
                message: "Cannot send messages to this user".into(),
            });
        }
        Ok(DmChannel {
            id: format!("dm-{user_id}"),
        })
    }

    async fn channel_message_send(&self, channel_id: &str, content: &str) -> AppResult<Message> {
        self.record(format!("channel_message_send {channel_id}"));
        self.state
            .lock()
            .unwrap()
            .messages
            .push((channel_id.to_string(), content.to_string()));
        Ok(Message {
            id: "m1".into(),
            channel_id: channel_id.into(),
            content: content.into(),
        })
    }

    async fn guild_member_delete_with_reason(
        &self,
        guild_id: &str,
        user_id: &str,
        reason: &str,
    ) -> AppResult<()> {
        self.record(format!("guild_member_delete_with_reason {guild_id} {user_id}"));
        self.state
            .lock()
            .unwrap()
            .removed
            .push((guild_id.into(), user_id.into(), reason.into()));
        Ok(())
    }
}

// ─── Connector & App ───────────────────────────────────

pub fn options(page_size: u32) -> SyncOptions {
    let mut options = SyncOptions::from(&AppConfig::test_default());
    options.member_page_size = page_size;
    options
}

pub fn connector(fake: &Arc<FakeDiscord>, page_size: u32) -> Connector {
    Connector::new(fake.clone(), options(page_size))
}

/// Test helper wrapping a fully-built router over a [`FakeDiscord`].
pub struct TestApp {
    router: Router,
    pub fake: Arc<FakeDiscord>,
}

impl TestApp {
    pub fn new(fake: FakeDiscord) -> Self {
        Self::with_config(fake, AppConfig::test_default())
    }

    pub fn with_config(fake: FakeDiscord, config: AppConfig) -> Self {
        let fake = fake.into_arc();
        let connector = Connector::new(fake.clone(), SyncOptions::from(&config));
        let router = build_router(AppState::new(config, connector));
        Self { router, fake }
    }

    /// Send a request and return (status, parsed JSON body or Null).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }

        let req = if let Some(b) = body {
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&b).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, None, Some(body)).await
    }
}
