//! Resource syncers: Discord objects in, resources, entitlements and grants out.
//!
//! The resource taxonomy is fixed, so the four syncers are a closed enum
//! rather than trait objects.

pub mod channels;
pub mod guilds;
pub mod roles;
pub mod users;

use std::sync::Arc;

use crate::config::{AppConfig, InviteChannelPolicy};
use crate::discord::DiscordApi;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ConnectorMetadata, Entitlement, Grant, Page, Resource, ResourceId, ResourceType, ResourceTypeId,
};

pub use channels::ChannelSyncer;
pub use guilds::GuildSyncer;
pub use roles::RoleSyncer;
pub use users::UserSyncer;

/// Knobs shared by the syncers, taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub member_page_size: u32,
    pub invite_max_age_hours: u32,
    pub invite_channel_policy: InviteChannelPolicy,
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            member_page_size: config.member_page_size,
            invite_max_age_hours: config.invite_max_age_hours,
            invite_channel_policy: config.invite_channel_policy.clone(),
        }
    }
}

pub enum Syncer {
    Guild(GuildSyncer),
    Channel(ChannelSyncer),
    Role(RoleSyncer),
    User(UserSyncer),
}

impl Syncer {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Syncer::Guild(_) => guilds::guild_resource_type(),
            Syncer::Channel(_) => channels::channel_resource_type(),
            Syncer::Role(_) => roles::role_resource_type(),
            Syncer::User(_) => users::user_resource_type(),
        }
    }

    pub async fn list(
        &mut self,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> AppResult<Page<Resource>> {
        match self {
            Syncer::Guild(s) => s.list(parent, page_token).await,
            Syncer::Channel(s) => s.list(parent, page_token).await,
            Syncer::Role(s) => s.list(parent, page_token).await,
            Syncer::User(s) => s.list(parent, page_token).await,
        }
    }

    pub async fn entitlements(
        &mut self,
        resource: &Resource,
        page_token: &str,
    ) -> AppResult<Page<Entitlement>> {
        match self {
            Syncer::Guild(s) => s.entitlements(resource, page_token).await,
            Syncer::Channel(s) => s.entitlements(resource, page_token).await,
            Syncer::Role(s) => s.entitlements(resource, page_token).await,
            Syncer::User(s) => s.entitlements(resource, page_token).await,
        }
    }

    pub async fn grants(&mut self, resource: &Resource, page_token: &str) -> AppResult<Page<Grant>> {
        match self {
            Syncer::Guild(s) => s.grants(resource, page_token).await,
            Syncer::Channel(s) => s.grants(resource, page_token).await,
            Syncer::Role(s) => s.grants(resource, page_token).await,
            Syncer::User(s) => s.grants(resource, page_token).await,
        }
    }

    /// Provision `entitlement` for `principal`. Only guild access can be granted.
    pub async fn grant(&mut self, principal: &Resource, entitlement: &Entitlement) -> AppResult<()> {
        match self {
            Syncer::Guild(s) => s.grant(principal, entitlement).await,
            other => Err(AppError::Unsupported(format!(
                "{} entitlements cannot be granted",
                other.resource_type().id
            ))),
        }
    }

    /// Deprovision a grant. Only guild access can be revoked.
    pub async fn revoke(&mut self, grant: &Grant) -> AppResult<()> {
        match self {
            Syncer::Guild(s) => s.revoke(grant).await,
            other => Err(AppError::Unsupported(format!(
                "{} entitlements cannot be revoked",
                other.resource_type().id
            ))),
        }
    }
}

/// The connector: one syncer per resource type, sharing one Discord client.
pub struct Connector {
    api: Arc<dyn DiscordApi>,
    options: SyncOptions,
    syncers: Vec<Syncer>,
}

impl Connector {
    pub fn new(api: Arc<dyn DiscordApi>, options: SyncOptions) -> Self {
        let syncers = build_syncers(&api, &options);
        Self {
            api,
            options,
            syncers,
        }
    }

    pub fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            display_name: "Discord Connector".into(),
            description: "Guilds, channels, roles and members of a Discord bot's guilds as resources, entitlements and grants.".into(),
        }
    }

    /// Exercise the bot token against Discord.
    pub async fn validate(&self) -> AppResult<()> {
        let user = self.api.current_user().await.map_err(|e| match e {
            AppError::Upstream { status: 401, .. } => {
                AppError::AuthError("Discord rejected the bot token".into())
            }
            other => other,
        })?;
        tracing::info!("Authenticated to Discord as {} ({})", user.username, user.id);
        Ok(())
    }

    pub fn resource_types(&self) -> Vec<ResourceType> {
        self.syncers.iter().map(Syncer::resource_type).collect()
    }

    pub fn syncer_mut(&mut self, resource_type: ResourceTypeId) -> AppResult<&mut Syncer> {
        self.syncers
            .iter_mut()
            .find(|syncer| syncer.resource_type().id == resource_type)
            .ok_or_else(|| AppError::NotFound(format!("no syncer for resource type {resource_type}")))
    }

    /// Start a fresh sync pass: every per-guild cache is dropped.
    pub fn reset(&mut self) {
        self.syncers = build_syncers(&self.api, &self.options);
    }
}

fn build_syncers(api: &Arc<dyn DiscordApi>, options: &SyncOptions) -> Vec<Syncer> {
    vec![
        Syncer::User(UserSyncer::new(api.clone(), options)),
        Syncer::Guild(GuildSyncer::new(api.clone(), options)),
        Syncer::Role(RoleSyncer::new(api.clone(), options)),
        Syncer::Channel(ChannelSyncer::new(api.clone(), options)),
    ]
}

// ─── Shared Helpers ────────────────────────────────────

pub(crate) fn expect_type(resource_id: &ResourceId, expected: ResourceTypeId) -> AppResult<()> {
    if resource_id.resource_type != expected {
        return Err(AppError::invalid_resource_type(
            expected.as_str(),
            resource_id.resource_type.as_str(),
        ));
    }
    Ok(())
}

/// Id of the guild a channel, role or user resource was listed under.
pub(crate) fn parent_guild_id(resource: &Resource) -> AppResult<&str> {
    match &resource.parent_resource_id {
        Some(parent) if parent.resource_type == ResourceTypeId::Guild => Ok(&parent.resource),
        Some(parent) => Err(AppError::invalid_resource_type(
            ResourceTypeId::Guild.as_str(),
            parent.resource_type.as_str(),
        )),
        None => Err(AppError::BadRequest(format!(
            "{} {} has no parent guild",
            resource.id.resource_type, resource.id.resource
        ))),
    }
}

/// Guild ids a `List` call covers: the parent guild when one is given, else
/// every guild the bot is in.
pub(crate) async fn guilds_in_scope(
    api: &dyn DiscordApi,
    parent: Option<&ResourceId>,
) -> AppResult<Vec<String>> {
    match parent {
        Some(parent) if parent.resource_type == ResourceTypeId::Guild => {
            Ok(vec![parent.resource.clone()])
        }
        _ => Ok(api
            .list_guilds()
            .await?
            .into_iter()
            .map(|guild| guild.id)
            .collect()),
    }
}

pub(crate) fn guild_resource_id(guild_id: &str) -> ResourceId {
    ResourceId::new(ResourceTypeId::Guild, guild_id)
}
