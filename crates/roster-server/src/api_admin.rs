//! Administrative endpoints.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{extract::Extension, Json};
use roster_db::list_tables;
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `GET /db/tables` and `GET /api/tables`.
///
/// Sits behind [`crate::middleware::admin_token_middleware`].
pub async fn list_tables_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let tables = with_conn(&state, |conn| Ok(list_tables(conn)?)).await?;

    Ok(Json(json!({
        "status": "success",
        "count": tables.len(),
        "tables": tables,
    })))
}
