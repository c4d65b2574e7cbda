use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::middleware::ApiClient;
use crate::models::*;
use crate::AppState;

/// GET /api/v1/metadata
pub async fn get_metadata(
    State(state): State<AppState>,
    _client: ApiClient,
) -> AppResult<Json<ConnectorMetadata>> {
    let connector = state.connector.lock().await;
    Ok(Json(connector.metadata()))
}

/// POST /api/v1/validate
pub async fn validate(State(state): State<AppState>, _client: ApiClient) -> AppResult<StatusCode> {
    let connector = state.connector.lock().await;
    connector.validate().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resource-types
pub async fn list_resource_types(
    State(state): State<AppState>,
    _client: ApiClient,
) -> AppResult<Json<Vec<ResourceType>>> {
    let connector = state.connector.lock().await;
    Ok(Json(connector.resource_types()))
}

/// GET /api/v1/resource-types/:resource_type/resources
pub async fn list_resources(
    State(state): State<AppState>,
    _client: ApiClient,
    Path(resource_type): Path<ResourceTypeId>,
    Query(query): Query<ListResourcesQuery>,
) -> AppResult<Json<Page<Resource>>> {
    let parent = query.parent();
    let page_token = query.page_token.unwrap_or_default();

    let mut connector = state.connector.lock().await;
    let page = connector
        .syncer_mut(resource_type)?
        .list(parent.as_ref(), &page_token)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/resource-types/:resource_type/entitlements
pub async fn list_entitlements(
    State(state): State<AppState>,
    _client: ApiClient,
    Path(resource_type): Path<ResourceTypeId>,
    Json(req): Json<ResourcePageRequest>,
) -> AppResult<Json<Page<Entitlement>>> {
    let mut connector = state.connector.lock().await;
    let page = connector
        .syncer_mut(resource_type)?
        .entitlements(&req.resource, &req.page_token)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/resource-types/:resource_type/grants
pub async fn list_grants(
    State(state): State<AppState>,
    _client: ApiClient,
    Path(resource_type): Path<ResourceTypeId>,
    Json(req): Json<ResourcePageRequest>,
) -> AppResult<Json<Page<Grant>>> {
    let mut connector = state.connector.lock().await;
    let page = connector
        .syncer_mut(resource_type)?
        .grants(&req.resource, &req.page_token)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/grants
/// Dispatched on the entitlement's resource type.
pub async fn create_grant(
    State(state): State<AppState>,
    _client: ApiClient,
    Json(req): Json<GrantRequest>,
) -> AppResult<StatusCode> {
    let mut connector = state.connector.lock().await;
    connector
        .syncer_mut(req.entitlement.resource.id.resource_type)?
        .grant(&req.principal, &req.entitlement)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/grants/revoke
pub async fn revoke_grant(
    State(state): State<AppState>,
    _client: ApiClient,
    Json(req): Json<RevokeRequest>,
) -> AppResult<StatusCode> {
    let mut connector = state.connector.lock().await;
    connector
        .syncer_mut(req.grant.entitlement.resource.id.resource_type)?
        .revoke(&req.grant)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sync-passes
/// Drops every per-guild cache so the next calls observe fresh remote state.
pub async fn start_sync_pass(
    State(state): State<AppState>,
    _client: ApiClient,
) -> AppResult<(StatusCode, Json<SyncPassResponse>)> {
    let mut connector = state.connector.lock().await;
    connector.reset();

    let response = SyncPassResponse {
        pass_id: Uuid::new_v4(),
        started_at: Utc::now(),
    };
    tracing::info!("Started sync pass {}", response.pass_id);
    Ok((StatusCode::CREATED, Json(response)))
}
