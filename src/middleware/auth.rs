use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::errors::AppError;
use crate::AppState;

/// Extractor guarding the connector surface with the configured shared secret.
/// Passes every request when no API key is configured.
/// Use in handler signatures: `_client: ApiClient`
#[derive(Debug, Clone)]
pub struct ApiClient;

#[axum::async_trait]
impl FromRequestParts<AppState> for ApiClient {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.config.api_key.is_empty() {
            return Ok(ApiClient);
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthError("Missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::AuthError("Invalid authorization format".into()))?;

        if token != state.config.api_key {
            return Err(AppError::AuthError("Invalid API key".into()));
        }

        Ok(ApiClient)
    }
}
