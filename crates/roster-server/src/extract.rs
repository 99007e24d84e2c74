//! Request extractors whose rejections use the [`ApiError`] envelope.

use crate::api::ApiError;
use crate::api_users::UserParams;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;

/// A user id taken from the `{id}` path segment.
pub struct UserId(pub i64);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<i64> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Validation(format!("invalid user id: {}", e.body_text())))?;
        Ok(Self(id))
    }
}

/// User fields from the query string overlaid with an optional JSON body.
///
/// A request without a `Content-Type` header has no body fields.
pub struct UserInput(pub UserParams);

impl<S> FromRequest<S> for UserInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let Query(query): Query<UserParams> = Query::from_request_parts(&mut parts, state)
            .await
            .map_err(|e| {
                ApiError::Validation(format!("invalid query string: {}", e.body_text()))
            })?;

        let req = Request::from_parts(parts, body);
        let body = <Option<Json<UserParams>> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(format!("invalid JSON body: {}", e.body_text())))?;

        Ok(Self(query.merge(body.map(|Json(params)| params))))
    }
}
