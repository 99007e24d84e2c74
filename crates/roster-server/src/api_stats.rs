//! Aggregate statistics handler.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{extract::Extension, Json};
use roster_db::user_stats;
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /api/stats
///
/// Recomputed on every call.
pub async fn get_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let stats = with_conn(&state, |conn| Ok(user_stats(conn)?)).await?;

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}
