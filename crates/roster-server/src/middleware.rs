use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::sync::Arc;

use crate::api::ApiError;
use crate::AppState;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Middleware guarding the introspection endpoints.
///
/// When `AppState::admin_token` is set, the request must present the same
/// value in `X-Admin-Token`. When it is unset every request passes.
pub async fn admin_token_middleware(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?
        .clone();

    if let Some(expected) = state.admin_token.as_deref() {
        let supplied = req
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if supplied != Some(expected) {
            tracing::warn!(path = %req.uri().path(), "rejected admin request without valid token");
            return Err(ApiError::Forbidden("admin token required".to_string()));
        }
    }

    Ok(next.run(req).await)
}
