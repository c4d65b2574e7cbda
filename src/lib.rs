// Library re-exports for integration tests.
// The binary (main.rs) boots config and logging, then serves or syncs.
// Integration tests in tests/ import the modules from this lib crate.

pub mod api;
pub mod cache;
pub mod config;
pub mod connector;
pub mod discord;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod sync;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};

use config::AppConfig;
use connector::Connector;

// ─── Application State ─────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Calls against one syncer are serialized; its caches are not shareable.
    pub connector: Arc<Mutex<Connector>>,
}

impl AppState {
    pub fn new(config: AppConfig, connector: Connector) -> Self {
        Self {
            config,
            connector: Arc::new(Mutex::new(connector)),
        }
    }
}

// ─── Router ────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    let resource_type_routes = Router::new()
        .route("/", get(api::connector::list_resource_types))
        .route("/:resource_type/resources", get(api::connector::list_resources))
        .route("/:resource_type/entitlements", post(api::connector::list_entitlements))
        .route("/:resource_type/grants", post(api::connector::list_grants));

    let grant_routes = Router::new()
        .route("/", post(api::connector::create_grant))
        .route("/revoke", post(api::connector::revoke_grant));

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/metadata", get(api::connector::get_metadata))
        .route("/validate", post(api::connector::validate))
        .route("/sync-passes", post(api::connector::start_sync_pass))
        .nest("/resource-types", resource_type_routes)
        .nest("/grants", grant_routes);

    Router::new()
        .nest("/api/v1", api)
        // TraceLayer: custom span excludes remote_addr
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::extract::Request| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        version = ?req.version(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG)),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
