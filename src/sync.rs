//! Local sequential driver: one full sync pass into a serializable snapshot.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connector::Connector;
use crate::errors::{AppError, AppResult};
use crate::models::{Entitlement, Grant, Resource, ResourceType, ResourceTypeId};

/// Resource types in the order a pass visits them.
pub const SYNC_ORDER: [ResourceTypeId; 4] = [
    ResourceTypeId::User,
    ResourceTypeId::Guild,
    ResourceTypeId::Role,
    ResourceTypeId::Channel,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resource_types: Vec<ResourceType>,
    pub resources: Vec<Resource>,
    pub entitlements: Vec<Entitlement>,
    pub grants: Vec<Grant>,
}

/// Tracks the tokens handed out by one paged walk so a syncer that keeps
/// returning the same token cannot loop forever.
#[derive(Default)]
struct TokenGuard {
    seen: HashSet<String>,
}

impl TokenGuard {
    /// `Some(token)` when another page should be fetched.
    fn next(&mut self, what: &str, token: String) -> AppResult<Option<String>> {
        if token.is_empty() {
            return Ok(None);
        }
        if !self.seen.insert(token.clone()) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "{what} returned page token {token:?} twice"
            )));
        }
        Ok(Some(token))
    }
}

/// Run one pass over every resource type. The connector's caches are reset
/// first; the first error aborts the pass.
pub async fn run_sync(connector: &mut Connector) -> AppResult<SyncSnapshot> {
    connector.reset();

    let pass_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!("Starting sync pass {}", pass_id);

    let mut resources = Vec::new();
    let mut entitlements = Vec::new();
    let mut grants = Vec::new();

    for resource_type in SYNC_ORDER {
        let syncer = connector.syncer_mut(resource_type)?;

        let mut listed: Vec<Resource> = Vec::new();
        let mut guard = TokenGuard::default();
        let mut token = String::new();
        loop {
            let page = syncer.list(None, &token).await?;
            listed.extend(page.items);
            match guard.next("List", page.next_page_token)? {
                Some(next) => token = next,
                None => break,
            }
        }

        for resource in &listed {
            let mut guard = TokenGuard::default();
            let mut token = String::new();
            loop {
                let page = syncer.entitlements(resource, &token).await?;
                entitlements.extend(page.items);
                match guard.next("Entitlements", page.next_page_token)? {
                    Some(next) => token = next,
                    None => break,
                }
            }

            let mut guard = TokenGuard::default();
            let mut token = String::new();
            loop {
                let page = syncer.grants(resource, &token).await?;
                grants.extend(page.items);
                match guard.next("Grants", page.next_page_token)? {
                    Some(next) => token = next,
                    None => break,
                }
            }
        }

        tracing::info!("Synced {} {} resources", listed.len(), resource_type);
        resources.extend(listed);
    }

    let snapshot = SyncSnapshot {
        pass_id,
        started_at,
        finished_at: Utc::now(),
        resource_types: connector.resource_types(),
        resources,
        entitlements,
        grants,
    };

    tracing::info!(
        "Finished sync pass {}: {} resources, {} entitlements, {} grants",
        snapshot.pass_id,
        snapshot.resources.len(),
        snapshot.entitlements.len(),
        snapshot.grants.len()
    );
    Ok(snapshot)
}

/// Write a snapshot as pretty-printed JSON.
pub async fn write_snapshot(snapshot: &SyncSnapshot, path: impl AsRef<Path>) -> AppResult<()> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    tokio::fs::write(path.as_ref(), json)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("writing {}: {e}", path.as_ref().display())))?;
    Ok(())
}
