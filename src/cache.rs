use std::collections::{BTreeMap, HashMap};

use crate::discord::{Channel, DiscordApi, Guild, Member, Role};
use crate::errors::{AppError, AppResult};

/// Walk a guild's member list with the after-cursor until a page comes back
/// empty or short. Each member is visited once; the first error aborts the walk.
pub async fn fetch_all_members(
    api: &dyn DiscordApi,
    guild_id: &str,
    page_size: u32,
) -> AppResult<Vec<Member>> {
    let mut members: Vec<Member> = Vec::new();
    let mut cursor = String::new();

    loop {
        let page = api.guild_members(guild_id, &cursor, page_size).await?;
        let Some(last) = page.last() else {
            break;
        };
        cursor = last.user.id.clone();

        let short_page = page.len() < page_size as usize;
        members.extend(page);
        if short_page {
            break;
        }
    }

    tracing::debug!("Fetched {} members of guild {}", members.len(), guild_id);
    Ok(members)
}

/// Per-guild lookups memoized for one sync pass.
///
/// Each map is filled on first access for a guild and never invalidated;
/// start a new pass (a new cache) to observe remote changes.
#[derive(Debug)]
pub struct GuildCache {
    page_size: u32,
    guilds: HashMap<String, Guild>,
    members: HashMap<String, BTreeMap<String, Member>>,
    roles: HashMap<String, HashMap<String, Role>>,
    channels: HashMap<String, HashMap<String, Channel>>,
}

impl GuildCache {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            guilds: HashMap::new(),
            members: HashMap::new(),
            roles: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    pub async fn guild(&mut self, api: &dyn DiscordApi, guild_id: &str) -> AppResult<&Guild> {
        if !self.guilds.contains_key(guild_id) {
            let guild = api.guild(guild_id).await?;
            self.guilds.insert(guild_id.to_string(), guild);
        }

        self.guilds
            .get(guild_id)
            .ok_or_else(|| AppError::NotFound(format!("guild {guild_id} not found")))
    }

    /// All members of a guild keyed by user id.
    pub async fn members(
        &mut self,
        api: &dyn DiscordApi,
        guild_id: &str,
    ) -> AppResult<&BTreeMap<String, Member>> {
        if !self.members.contains_key(guild_id) {
            let members = fetch_all_members(api, guild_id, self.page_size).await?;
            let by_id = members
                .into_iter()
                .map(|member| (member.user.id.clone(), member))
                .collect();
            self.members.insert(guild_id.to_string(), by_id);
        }

        self.members
            .get(guild_id)
            .ok_or_else(|| AppError::NotFound(format!("members of guild {guild_id} not found")))
    }

    pub async fn member(
        &mut self,
        api: &dyn DiscordApi,
        guild_id: &str,
        user_id: &str,
    ) -> AppResult<&Member> {
        self.members(api, guild_id)
            .await?
            .get(user_id)
            .ok_or_else(|| AppError::NotFound(format!("member {user_id} not found in guild {guild_id}")))
    }

    pub async fn role(
        &mut self,
        api: &dyn DiscordApi,
        guild_id: &str,
        role_id: &str,
    ) -> AppResult<&Role> {
        if !self.roles.contains_key(guild_id) {
            let roles = api.guild_roles(guild_id).await?;
            let by_id = roles.into_iter().map(|role| (role.id.clone(), role)).collect();
            self.roles.insert(guild_id.to_string(), by_id);
        }

        self.roles
            .get(guild_id)
            .and_then(|roles| roles.get(role_id))
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} not found in guild {guild_id}")))
    }

    pub async fn channel(
        &mut self,
        api: &dyn DiscordApi,
        guild_id: &str,
        channel_id: &str,
    ) -> AppResult<&Channel> {
        if !self.channels.contains_key(guild_id) {
            let channels = api.guild_channels(guild_id).await?;
            let by_id = channels
                .into_iter()
                .map(|channel| (channel.id.clone(), channel))
                .collect();
            self.channels.insert(guild_id.to_string(), by_id);
        }

        self.channels
            .get(guild_id)
            .and_then(|channels| channels.get(channel_id))
            .ok_or_else(|| {
                AppError::NotFound(format!("channel {channel_id} not found in guild {guild_id}"))
            })
    }
}
