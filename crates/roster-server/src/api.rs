//! Shared handler plumbing and the liveness/health endpoints.

use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_db::{AcquireError, UserError};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// This is the only place a failure becomes JSON:
/// `{"success": false, "error": <kind>, "detail": <message>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The database could not be reached within the retry budget.
    #[error("{0}")]
    Connection(String),
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    DuplicateKey(String),
    #[error("{0}")]
    NotFound(String),
    /// The request is missing or lacks required fields.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    /// Anything else. The message is passed through to the caller.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Connection(_) => "connection_error",
            ApiError::DuplicateKey(_) => "duplicate_key",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Internal(_) => "unknown_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Connection(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DuplicateKey(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": self.kind(),
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<AcquireError> for ApiError {
    fn from(e: AcquireError) -> Self {
        ApiError::Connection(e.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::DuplicateEmail(_) => ApiError::DuplicateKey(e.to_string()),
            UserError::NotFound(_) => ApiError::NotFound(e.to_string()),
            UserError::NoFieldsToUpdate => ApiError::Validation(e.to_string()),
            UserError::Database(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Runs `op` on the blocking pool with a freshly acquired connection.
///
/// The connection goes back to the pool when `op` returns, whether it
/// succeeded, failed or panicked.
pub(crate) async fn with_conn<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.acquire()?;
        op(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("task join error: {}", e)))?
}

/// Handler for `GET /`.
///
/// Liveness only; never touches the database.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "roster user API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for `GET /health`.
///
/// Always answers `200 OK`; database reachability is reported in the body.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let check = with_conn(&state, |conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    })
    .await;

    match check {
        Ok(()) => Json(json!({
            "status": "healthy",
            "database": "connected",
            "api": "running",
        })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            Json(json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string(),
            }))
        }
    }
}
