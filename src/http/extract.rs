//! Request extractors: operator identity and JSON-rejecting path params.
//!
//! Authentication lives in front of this service; it forwards the session
//! token and user id of the logged-in admin as headers.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::types::{Operator, SessionId, UserId};

use super::error::AppError;

/// Header carrying the operator's session token.
pub const SESSION_HEADER: &str = "x-session-id";
/// Header carrying the operator's user id.
pub const USER_HEADER: &str = "x-user-id";

/// The operator making the request, taken from [`SESSION_HEADER`] and [`USER_HEADER`].
#[derive(Debug, Clone)]
pub struct CurrentOperator(pub Operator);

impl<S: Send + Sync> FromRequestParts<S> for CurrentOperator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = header(parts, SESSION_HEADER)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {SESSION_HEADER} header")))?;

        let user_id: UserId = header(parts, USER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_HEADER} header")))?
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("Invalid {USER_HEADER} header")))?;

        Ok(Self(Operator::new(SessionId::new(session), user_id)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

/// [`Path`] whose rejection is an [`AppError::BadRequest`] JSON body.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
    }
}
