//! Authentication extractors.
//!
//! Callers authenticate with `Authorization: Bearer <token>`. Tokens are
//! resolved through [`AuthService::authenticate`]; a present but unknown or
//! expired token is always rejected, even where authentication is optional.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireUser(user): RequireUser) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireUser(pub User);

/// Extractor that requires an authenticated administrator.
///
/// Non-admin users are rejected with 403.
pub struct RequireAdmin(pub User);

/// Extractor that resolves the user when a bearer token is present.
pub struct OptionalUser(pub Option<User>);

/// Pull the bearer token out of the `Authorization` header.
///
/// A header that is present but not a bearer credential is rejected.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("Not authorized, token failed".to_string()))
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };
    let user = AuthService::new(state.pool()).authenticate(token).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::Span::current().record("user_id", tracing::field::display(&user.id));
    Ok(Some(user))
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_user(parts, state).await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/profile");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_absent() {
        assert!(bearer_token(&parts(None)).unwrap().is_none());
    }

    #[test]
    fn test_bearer_token_present() {
        let parts = parts(Some("Bearer abc123"));
        assert_eq!(bearer_token(&parts).unwrap(), Some("abc123"));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        assert!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer "))).is_err());
    }
}
