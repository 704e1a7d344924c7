use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use quiz_core::model::UserId;

use crate::response::AppError;

/// Header the authentication proxy sets on every forwarded request.
pub const USER_HEADER: &str = "x-user-id";

/// The caller, as identified by the upstream proxy.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))?;
        let user_id =
            UserId::new(raw).map_err(|err| AppError::unauthorized(err.to_string()))?;
        Ok(Self(user_id))
    }
}
