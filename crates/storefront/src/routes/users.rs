//! Account route handlers: registration, login and profile.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::{RequireUser, auth_rate_limiter};
use crate::models::{AuthResponse, NewUser, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Body of `POST /api/users/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build the users router. Login and registration are rate limited per IP.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter())
        .route("/profile", get(profile))
}

#[tracing::instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let Json(input) = body?;
    let (user, token) = AuthService::new(state.pool()).register(input).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

#[tracing::instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(input) = body?;
    let (user, token) = AuthService::new(state.pool())
        .login(&input.email, &input.password)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { user, token }))
}

async fn profile(RequireUser(user): RequireUser) -> Json<User> {
    Json(user)
}
