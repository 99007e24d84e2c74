//! User CRUD handlers.
//!
//! Create and update accept their fields from the query string, a JSON body,
//! or both; a field present in the body wins over the same field in the
//! query string.

use crate::api::{with_conn, ApiError};
use crate::extract::{UserId, UserInput};
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, Json};
use roster_db::{create_user, delete_user, get_user, list_users, update_user};
use roster_types::{NewUser, UserPatch};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// User fields as they arrive over HTTP. Every field is optional here;
/// create enforces `name` and `email`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

impl UserParams {
    /// Overlays `body` on top of `self`.
    pub(crate) fn merge(self, body: Option<UserParams>) -> UserParams {
        let Some(body) = body else {
            return self;
        };
        UserParams {
            name: body.name.or(self.name),
            email: body.email.or(self.email),
            role: body.role.or(self.role),
            status: body.status.or(self.status),
        }
    }

    fn into_new_user(self) -> Result<NewUser, ApiError> {
        let name = self
            .name
            .ok_or_else(|| ApiError::Validation("missing required field: name".to_string()))?;
        let email = self
            .email
            .ok_or_else(|| ApiError::Validation("missing required field: email".to_string()))?;
        Ok(NewUser {
            name,
            email,
            role: self.role,
            status: self.status,
        })
    }

    fn into_patch(self) -> UserPatch {
        UserPatch {
            name: self.name,
            email: self.email,
            role: self.role,
            status: self.status,
        }
    }
}

/// GET /api/users
pub async fn list_users_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let users = with_conn(&state, |conn| Ok(list_users(conn)?)).await?;

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "data": users,
    })))
}

/// GET /api/users/:id
pub async fn get_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<Json<Value>, ApiError> {
    let user = with_conn(&state, move |conn| Ok(get_user(conn, id)?)).await?;

    Ok(Json(json!({
        "success": true,
        "data": user,
    })))
}

/// POST /api/users
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    UserInput(params): UserInput,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let new_user = params.into_new_user()?;
    let user_id = with_conn(&state, move |conn| Ok(create_user(conn, &new_user)?)).await?;

    tracing::info!(user_id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user_id": user_id,
        })),
    ))
}

/// PUT /api/users/:id
///
/// Partial update: only supplied fields change.
pub async fn update_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    UserId(id): UserId,
    UserInput(params): UserInput,
) -> Result<Json<Value>, ApiError> {
    let patch = params.into_patch();
    with_conn(&state, move |conn| Ok(update_user(conn, id, &patch)?)).await?;

    tracing::info!(user_id = id, "user updated");

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
    })))
}

/// DELETE /api/users/:id
pub async fn delete_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<Json<Value>, ApiError> {
    with_conn(&state, move |conn| Ok(delete_user(conn, id)?)).await?;

    tracing::info!(user_id = id, "user deleted");

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

/// GET /db/users
///
/// Older listing shape, kept for existing dashboards.
pub async fn legacy_list_users_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let users = with_conn(&state, |conn| Ok(list_users(conn)?)).await?;

    Ok(Json(json!({
        "status": "success",
        "count": users.len(),
        "users": users,
    })))
}

/// POST /db/users
///
/// Older create shape: `name` and `email` only, role and status default.
pub async fn legacy_create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    UserInput(params): UserInput,
) -> Result<Json<Value>, ApiError> {
    let new_user = UserParams {
        role: None,
        status: None,
        ..params
    }
    .into_new_user()?;
    let user_id = with_conn(&state, move |conn| Ok(create_user(conn, &new_user)?)).await?;

    tracing::info!(user_id, "user created via legacy endpoint");

    Ok(Json(json!({
        "status": "success",
        "message": "User created successfully",
        "user_id": user_id,
    })))
}
