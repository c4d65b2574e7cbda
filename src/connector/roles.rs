use std::sync::Arc;

use crate::cache::GuildCache;
use crate::connector::users::new_member_resource;
use crate::connector::{expect_type, guild_resource_id, guilds_in_scope, parent_guild_id, SyncOptions};
use crate::discord::{DiscordApi, Role};
use crate::errors::AppResult;
use crate::models::{
    Entitlement, Grant, Page, Resource, ResourceId, ResourceTrait, ResourceType, ResourceTypeId,
};
use crate::permissions::{self, ROLE_PERMISSIONS};

const MEMBER_SLUG: &str = "member";

pub fn role_resource_type() -> ResourceType {
    ResourceType {
        id: ResourceTypeId::Role,
        display_name: "Role".into(),
        traits: vec![ResourceTrait::Role],
    }
}

pub fn new_role_resource(role: &Role, guild_id: &str) -> Resource {
    Resource::new(ResourceTypeId::Role, &role.id, &role.name).with_parent(guild_resource_id(guild_id))
}

pub fn new_role_member_entitlement(resource: &Resource, role: &Role) -> Entitlement {
    Entitlement::assignment(
        resource,
        MEMBER_SLUG,
        format!("Member of {}", role.name),
        &[ResourceTypeId::User],
    )
}

pub fn new_role_permission_entitlement(
    resource: &Resource,
    role: &Role,
    permission: u64,
) -> AppResult<Entitlement> {
    let name = permissions::name_of(permission)?;
    Ok(Entitlement::permission(
        resource,
        name,
        format!("{} for {}", name, role.name),
        &[ResourceTypeId::User, ResourceTypeId::Role],
    ))
}

/// Permission entitlements for every known bit the role carries.
fn role_permission_entitlements(resource: &Resource, role: &Role) -> AppResult<Vec<Entitlement>> {
    permissions::decode(role.permissions, &ROLE_PERMISSIONS)
        .map(|permission| new_role_permission_entitlement(resource, role, permission))
        .collect()
}

pub struct RoleSyncer {
    api: Arc<dyn DiscordApi>,
    cache: GuildCache,
}

impl RoleSyncer {
    pub fn new(api: Arc<dyn DiscordApi>, options: &SyncOptions) -> Self {
        Self {
            api,
            cache: GuildCache::new(options.member_page_size),
        }
    }

    pub async fn list(&mut self, parent: Option<&ResourceId>, _page_token: &str) -> AppResult<Page<Resource>> {
        let mut resources = Vec::new();

        for guild_id in guilds_in_scope(self.api.as_ref(), parent).await? {
            let roles = self.api.guild_roles(&guild_id).await?;
            resources.extend(roles.iter().map(|role| new_role_resource(role, &guild_id)));
        }

        Ok(Page::last(resources))
    }

    pub async fn entitlements(&mut self, resource: &Resource, _page_token: &str) -> AppResult<Page<Entitlement>> {
        expect_type(&resource.id, ResourceTypeId::Role)?;
        let guild_id = parent_guild_id(resource)?;
        let role = self
            .cache
            .role(self.api.as_ref(), guild_id, &resource.id.resource)
            .await?;

        let mut entitlements = vec![new_role_member_entitlement(resource, role)];
        entitlements.extend(role_permission_entitlements(resource, role)?);

        Ok(Page::last(entitlements))
    }

    /// The role holds its own permission entitlements; members carrying the
    /// role hold its assignment.
    pub async fn grants(&mut self, resource: &Resource, page_token: &str) -> AppResult<Page<Grant>> {
        expect_type(&resource.id, ResourceTypeId::Role)?;
        tracing::debug!("RoleSyncer::grants {} page_token={:?}", resource.id.resource, page_token);

        let guild_id = parent_guild_id(resource)?.to_string();
        let role_id = resource.id.resource.as_str();
        let api = self.api.as_ref();

        self.cache.guild(api, &guild_id).await?;
        let role = self.cache.role(api, &guild_id, role_id).await?.clone();

        let mut grants: Vec<Grant> = role_permission_entitlements(resource, &role)?
            .into_iter()
            .map(|entitlement| Grant::new(entitlement, resource.clone()))
            .collect();

        let assignment = new_role_member_entitlement(resource, &role);
        let members = self.cache.members(api, &guild_id).await?;
        grants.extend(
            members
                .values()
                .filter(|member| member.roles.iter().any(|id| id == role_id))
                .map(|member| Grant::new(assignment.clone(), new_member_resource(member, &guild_id))),
        );

        Ok(Page::last(grants))
    }
}
