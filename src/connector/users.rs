use std::sync::Arc;

use crate::cache::fetch_all_members;
use crate::connector::{guild_resource_id, guilds_in_scope, SyncOptions};
use crate::discord::{DiscordApi, Member};
use crate::errors::AppResult;
use crate::models::{
    AccountType, Entitlement, Grant, Page, Resource, ResourceId, ResourceTrait, ResourceType,
    ResourceTypeId, UserTrait,
};

pub fn user_resource_type() -> ResourceType {
    ResourceType {
        id: ResourceTypeId::User,
        display_name: "User".into(),
        traits: vec![ResourceTrait::User],
    }
}

/// A guild member as a user resource parented to its guild.
pub fn new_member_resource(member: &Member, guild_id: &str) -> Resource {
    let account_type = if member.user.bot {
        AccountType::Service
    } else {
        AccountType::Human
    };

    Resource::new(ResourceTypeId::User, &member.user.id, member.display_name())
        .with_parent(guild_resource_id(guild_id))
        .with_user_trait(UserTrait {
            account_type,
            login: member.user.username.clone(),
        })
}

/// Members are leaf principals: listed, but never holders of entitlements of their own.
pub struct UserSyncer {
    api: Arc<dyn DiscordApi>,
    page_size: u32,
}

impl UserSyncer {
    pub fn new(api: Arc<dyn DiscordApi>, options: &SyncOptions) -> Self {
        Self {
            api,
            page_size: options.member_page_size,
        }
    }

    pub async fn list(&mut self, parent: Option<&ResourceId>, _page_token: &str) -> AppResult<Page<Resource>> {
        let mut resources = Vec::new();

        for guild_id in guilds_in_scope(self.api.as_ref(), parent).await? {
            let members = fetch_all_members(self.api.as_ref(), &guild_id, self.page_size).await?;
            resources.extend(members.iter().map(|member| new_member_resource(member, &guild_id)));
        }

        Ok(Page::last(resources))
    }

    pub async fn entitlements(&mut self, _resource: &Resource, _page_token: &str) -> AppResult<Page<Entitlement>> {
        Ok(Page::last(Vec::new()))
    }

    pub async fn grants(&mut self, _resource: &Resource, _page_token: &str) -> AppResult<Page<Grant>> {
        Ok(Page::last(Vec::new()))
    }
}
