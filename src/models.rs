use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Resource Types ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTypeId {
    Guild,
    Channel,
    Role,
    User,
}

impl ResourceTypeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTypeId::Guild => "guild",
            ResourceTypeId::Channel => "channel",
            ResourceTypeId::Role => "role",
            ResourceTypeId::User => "user",
        }
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marks resource types the governance platform treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTrait {
    User,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: ResourceTypeId,
    pub display_name: String,
    #[serde(default)]
    pub traits: Vec<ResourceTrait>,
}

// ─── Resources ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub resource_type: ResourceTypeId,
    pub resource: String,
}

impl ResourceId {
    pub fn new(resource_type: ResourceTypeId, resource: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource: resource.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Human,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTrait {
    pub account_type: AccountType,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_resource_id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_trait: Option<UserTrait>,
}

impl Resource {
    pub fn new(resource_type: ResourceTypeId, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, id),
            display_name: display_name.into(),
            parent_resource_id: None,
            description: None,
            user_trait: None,
        }
    }

    pub fn with_parent(mut self, parent: ResourceId) -> Self {
        self.parent_resource_id = Some(parent);
        self
    }

    /// Empty descriptions are dropped.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_user_trait(mut self, user_trait: UserTrait) -> Self {
        self.user_trait = Some(user_trait);
        self
    }
}

// ─── Entitlements & Grants ─────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementPurpose {
    Assignment,
    Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// `<type>:<id>:<slug>`
    pub id: String,
    pub resource: Resource,
    pub display_name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub purpose: EntitlementPurpose,
    pub grantable_to: Vec<ResourceTypeId>,
}

impl Entitlement {
    fn new(
        purpose: EntitlementPurpose,
        resource: &Resource,
        slug: &str,
        display_name: String,
        grantable_to: &[ResourceTypeId],
    ) -> Self {
        Self {
            id: entitlement_id(&resource.id, slug),
            resource: resource.clone(),
            display_name,
            slug: slug.to_string(),
            description: None,
            purpose,
            grantable_to: grantable_to.to_vec(),
        }
    }

    pub fn assignment(
        resource: &Resource,
        slug: &str,
        display_name: String,
        grantable_to: &[ResourceTypeId],
    ) -> Self {
        Self::new(EntitlementPurpose::Assignment, resource, slug, display_name, grantable_to)
    }

    pub fn permission(
        resource: &Resource,
        slug: &str,
        display_name: String,
        grantable_to: &[ResourceTypeId],
    ) -> Self {
        Self::new(EntitlementPurpose::Permission, resource, slug, display_name, grantable_to)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }
}

pub fn entitlement_id(resource: &ResourceId, slug: &str) -> String {
    format!("{}:{}:{}", resource.resource_type, resource.resource, slug)
}

/// A principal currently holding an entitlement. Identity is
/// (entitlement id, principal id); grants are recomputed every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: String,
    pub entitlement: Entitlement,
    pub principal: Resource,
}

impl Grant {
    pub fn new(entitlement: Entitlement, principal: Resource) -> Self {
        let id = format!(
            "{}:{}:{}",
            entitlement.id, principal.id.resource_type, principal.id.resource
        );
        Self {
            id,
            entitlement,
            principal,
        }
    }
}

// ─── Pagination ────────────────────────────────────────

/// One page of results. An empty `next_page_token` means there are no more pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.into(),
        }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, String::new())
    }

    pub fn has_more(&self) -> bool {
        !self.next_page_token.is_empty()
    }
}

// ─── Connector Surface ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ListResourcesQuery {
    pub parent_type: Option<ResourceTypeId>,
    pub parent_id: Option<String>,
    pub page_token: Option<String>,
}

impl ListResourcesQuery {
    pub fn parent(&self) -> Option<ResourceId> {
        match (self.parent_type, self.parent_id.as_deref()) {
            (Some(resource_type), Some(id)) if !id.is_empty() => Some(ResourceId::new(resource_type, id)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourcePageRequest {
    pub resource: Resource,
    #[serde(default)]
    pub page_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub principal: Resource,
    pub entitlement: Entitlement,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub grant: Grant,
}

#[derive(Debug, Serialize)]
pub struct SyncPassResponse {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
}
