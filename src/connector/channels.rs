use std::sync::Arc;

use crate::cache::GuildCache;
use crate::connector::roles::new_role_resource;
use crate::connector::users::new_member_resource;
use crate::connector::{expect_type, guild_resource_id, guilds_in_scope, parent_guild_id, SyncOptions};
use crate::discord::{Channel, ChannelKind, DiscordApi, OverwriteKind};
use crate::errors::AppResult;
use crate::models::{Entitlement, Grant, Page, Resource, ResourceId, ResourceType, ResourceTypeId};
use crate::permissions::{self, CHANNEL_PERMISSIONS, TEXT_CHANNEL_PERMISSIONS};

pub fn channel_resource_type() -> ResourceType {
    ResourceType {
        id: ResourceTypeId::Channel,
        display_name: "Channel".into(),
        traits: vec![],
    }
}

/// Only text and voice channels are synced.
pub fn is_synced_kind(kind: ChannelKind) -> bool {
    matches!(kind, ChannelKind::Text | ChannelKind::Voice)
}

pub fn new_channel_resource(channel: &Channel, guild_id: &str) -> Resource {
    Resource::new(ResourceTypeId::Channel, &channel.id, &channel.name)
        .with_parent(guild_resource_id(guild_id))
        .with_description(channel.topic.clone())
}

pub fn new_channel_entitlement(
    resource: &Resource,
    channel_name: &str,
    permission: u64,
) -> AppResult<Entitlement> {
    let name = permissions::name_of(permission)?;
    Ok(Entitlement::permission(
        resource,
        name,
        format!("{} for {}", name, channel_name),
        &[ResourceTypeId::User, ResourceTypeId::Role],
    ))
}

/// Permissions exposed as entitlements on a channel of the given kind.
fn entitlement_permissions(kind: ChannelKind) -> &'static [u64] {
    match kind {
        ChannelKind::Voice => CHANNEL_PERMISSIONS.as_slice(),
        _ => TEXT_CHANNEL_PERMISSIONS,
    }
}

pub struct ChannelSyncer {
    api: Arc<dyn DiscordApi>,
    cache: GuildCache,
}

impl ChannelSyncer {
    pub fn new(api: Arc<dyn DiscordApi>, options: &SyncOptions) -> Self {
        Self {
            api,
            cache: GuildCache::new(options.member_page_size),
        }
    }

    pub async fn list(&mut self, parent: Option<&ResourceId>, _page_token: &str) -> AppResult<Page<Resource>> {
        let mut resources = Vec::new();

        for guild_id in guilds_in_scope(self.api.as_ref(), parent).await? {
            let channels = self.api.guild_channels(&guild_id).await?;
            resources.extend(
                channels
                    .iter()
                    .filter(|channel| is_synced_kind(channel.kind))
                    .map(|channel| new_channel_resource(channel, &guild_id)),
            );
        }

        Ok(Page::last(resources))
    }

    pub async fn entitlements(&mut self, resource: &Resource, _page_token: &str) -> AppResult<Page<Entitlement>> {
        expect_type(&resource.id, ResourceTypeId::Channel)?;
        let channel = self.api.channel(&resource.id.resource).await?;

        let entitlements = entitlement_permissions(channel.kind)
            .iter()
            .map(|&permission| new_channel_entitlement(resource, &channel.name, permission))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Page::last(entitlements))
    }

    /// Grants derived from the channel's permission overwrites.
    ///
    /// A member overwrite grants the member's effective channel permissions;
    /// a role overwrite grants the role's own permission bits.
    pub async fn grants(&mut self, resource: &Resource, page_token: &str) -> AppResult<Page<Grant>> {
        expect_type(&resource.id, ResourceTypeId::Channel)?;
        tracing::debug!("ChannelSyncer::grants {} page_token={:?}", resource.id.resource, page_token);

        let guild_id = parent_guild_id(resource)?.to_string();
        let channel_id = resource.id.resource.as_str();
        let api = self.api.as_ref();

        let channel = self.cache.channel(api, &guild_id, channel_id).await?.clone();

        let mut grants = Vec::new();
        for overwrite in &channel.permission_overwrites {
            let (principal, bits) = match overwrite.kind {
                OverwriteKind::Member => {
                    // Effective permissions come from the cached guild and
                    // member, not one REST round-trip per overwrite.
                    let guild = self.cache.guild(api, &guild_id).await?.clone();
                    let member = self.cache.member(api, &guild_id, &overwrite.id).await?;
                    let bits = permissions::compute_channel_permissions(&guild, member, &channel);
                    (new_member_resource(member, &guild_id), bits)
                }
                OverwriteKind::Role => {
                    let role = self.cache.role(api, &guild_id, &overwrite.id).await?;
                    (new_role_resource(role, &guild_id), role.permissions)
                }
            };

            for permission in permissions::decode(bits, &CHANNEL_PERMISSIONS) {
                let entitlement = new_channel_entitlement(resource, &channel.name, permission)?;
                grants.push(Grant::new(entitlement, principal.clone()));
            }
        }

        Ok(Page::last(grants))
    }
}
