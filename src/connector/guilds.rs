use std::sync::Arc;

use crate::cache::GuildCache;
use crate::config::{InviteChannelPolicy, MAX_INVITE_AGE_HOURS};
use crate::connector::users::new_member_resource;
use crate::connector::{expect_type, guilds_in_scope, SyncOptions};
use crate::discord::{Channel, ChannelKind, DiscordApi, Guild, InviteOptions};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Entitlement, Grant, Page, Resource, ResourceId, ResourceType, ResourceTypeId,
};

const ACCESS_SLUG: &str = "access";

pub fn guild_resource_type() -> ResourceType {
    ResourceType {
        id: ResourceTypeId::Guild,
        display_name: "Guild".into(),
        traits: vec![],
    }
}

pub fn new_guild_resource(guild: &Guild) -> Resource {
    Resource::new(ResourceTypeId::Guild, &guild.id, &guild.name)
        .with_description(guild.description.clone())
}

/// "Access to <guild>": membership of the guild itself.
pub fn new_guild_access_entitlement(resource: &Resource, guild: &Guild) -> Entitlement {
    Entitlement::assignment(
        resource,
        ACCESS_SLUG,
        format!("Access to {}", guild.name),
        &[ResourceTypeId::User],
    )
    .with_description(guild.description.clone())
}

/// Pick the channel an invite should point at. `None` when the guild has no
/// eligible text channel.
pub fn select_invite_channel(
    policy: &InviteChannelPolicy,
    guild: &Guild,
    channels: &[Channel],
) -> Option<String> {
    let rules_channel = guild
        .rules_channel_id
        .clone()
        .filter(|id| !id.is_empty());

    let text_channels = || channels.iter().filter(|c| c.kind == ChannelKind::Text);

    match policy {
        InviteChannelPolicy::Fixed(channel_id) => Some(channel_id.clone()),
        InviteChannelPolicy::RulesOrBusiest => rules_channel.or_else(|| {
            // Highest member count, earliest position on ties
            text_channels()
                .max_by(|a, b| {
                    a.member_count
                        .unwrap_or(0)
                        .cmp(&b.member_count.unwrap_or(0))
                        .then(b.position.cmp(&a.position))
                })
                .map(|c| c.id.clone())
        }),
        InviteChannelPolicy::RulesOrFirstText => rules_channel.or_else(|| {
            text_channels()
                .min_by_key(|c| c.position)
                .map(|c| c.id.clone())
        }),
    }
}

fn invite_max_age_secs(hours: u32) -> AppResult<u32> {
    if hours > MAX_INVITE_AGE_HOURS {
        return Err(AppError::Config(format!(
            "invite max age of {hours}h exceeds {MAX_INVITE_AGE_HOURS}h"
        )));
    }
    Ok(hours * 60 * 60)
}

pub struct GuildSyncer {
    api: Arc<dyn DiscordApi>,
    cache: GuildCache,
    page_size: u32,
    invite_max_age_hours: u32,
    invite_channel_policy: InviteChannelPolicy,
}

impl GuildSyncer {
    pub fn new(api: Arc<dyn DiscordApi>, options: &SyncOptions) -> Self {
        Self {
            api,
            cache: GuildCache::new(options.member_page_size),
            page_size: options.member_page_size,
            invite_max_age_hours: options.invite_max_age_hours,
            invite_channel_policy: options.invite_channel_policy.clone(),
        }
    }

    pub async fn list(&mut self, parent: Option<&ResourceId>, _page_token: &str) -> AppResult<Page<Resource>> {
        // Guilds are top-level: a guild parent narrows the listing to itself.
        let resources = match parent {
            Some(_) => {
                let mut resources = Vec::new();
                for guild_id in guilds_in_scope(self.api.as_ref(), parent).await? {
                    let guild = self.cache.guild(self.api.as_ref(), &guild_id).await?;
                    resources.push(new_guild_resource(guild));
                }
                resources
            }
            None => self
                .api
                .list_guilds()
                .await?
                .iter()
                .map(new_guild_resource)
                .collect(),
        };

        Ok(Page::last(resources))
    }

    pub async fn entitlements(&mut self, resource: &Resource, _page_token: &str) -> AppResult<Page<Entitlement>> {
        expect_type(&resource.id, ResourceTypeId::Guild)?;
        let guild = self.cache.guild(self.api.as_ref(), &resource.id.resource).await?;

        Ok(Page::last(vec![new_guild_access_entitlement(resource, guild)]))
    }

    /// One page of guild members, each granted guild access. The page token is
    /// the last user id seen.
    pub async fn grants(&mut self, resource: &Resource, page_token: &str) -> AppResult<Page<Grant>> {
        expect_type(&resource.id, ResourceTypeId::Guild)?;
        tracing::debug!("GuildSyncer::grants {} page_token={:?}", resource.id.resource, page_token);

        let guild_id = resource.id.resource.as_str();
        let entitlement = {
            let guild = self.cache.guild(self.api.as_ref(), guild_id).await?;
            new_guild_access_entitlement(resource, guild)
        };

        let members = self
            .api
            .guild_members(guild_id, page_token, self.page_size)
            .await?;

        let next_page_token = match members.last() {
            Some(last) if members.len() >= self.page_size as usize => last.user.id.clone(),
            _ => String::new(),
        };

        let grants = members
            .iter()
            .map(|member| Grant::new(entitlement.clone(), new_member_resource(member, guild_id)))
            .collect();

        Ok(Page::new(grants, next_page_token))
    }

    /// Invite `principal` to the guild: single-use invite, delivered by DM.
    /// Nothing is rolled back if a later step fails.
    pub async fn grant(&mut self, principal: &Resource, entitlement: &Entitlement) -> AppResult<()> {
        expect_type(&entitlement.resource.id, ResourceTypeId::Guild)?;
        expect_type(&principal.id, ResourceTypeId::User)?;
        let max_age = invite_max_age_secs(self.invite_max_age_hours)?;

        let guild = self.api.guild(&entitlement.resource.id.resource).await?;

        let channel_id = match &self.invite_channel_policy {
            InviteChannelPolicy::Fixed(id) => id.clone(),
            policy => {
                let channels = match guild.rules_channel_id.as_deref() {
                    Some(id) if !id.is_empty() => Vec::new(),
                    _ => self.api.guild_channels(&guild.id).await?,
                };
                select_invite_channel(policy, &guild, &channels).ok_or_else(|| {
                    AppError::NotFound(format!("no text channel to invite into in guild {}", guild.id))
                })?
            }
        };

        let options = InviteOptions {
            max_age,
            max_uses: 1,
            unique: true,
        };
        let invite = self.api.channel_invite_create(&channel_id, &options).await?;

        let dm = self.api.user_channel_create(&principal.id.resource).await?;

        let guild_name = invite
            .guild
            .as_ref()
            .map(|g| g.name.as_str())
            .unwrap_or(&guild.name);
        self.api
            .channel_message_send(
                &dm.id,
                &format!("You've been invited to {}, {}", guild_name, invite.url()),
            )
            .await?;

        tracing::info!(
            "Sent invite {} for guild {} to user {}",
            invite.code,
            guild.id,
            principal.id.resource
        );
        Ok(())
    }

    /// Remove the grant's principal from the guild.
    pub async fn revoke(&mut self, grant: &Grant) -> AppResult<()> {
        let guild_resource = &grant.entitlement.resource;
        expect_type(&guild_resource.id, ResourceTypeId::Guild)?;
        expect_type(&grant.principal.id, ResourceTypeId::User)?;

        let guild = self.api.guild(&guild_resource.id.resource).await?;
        self.api
            .guild_member_delete_with_reason(
                &guild.id,
                &grant.principal.id.resource,
                &format!("Access to {} was revoked.", guild.name),
            )
            .await?;

        tracing::info!(
            "Removed user {} from guild {}",
            grant.principal.id.resource,
            guild.id
        );
        Ok(())
    }
}
