use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lk_core::config::Feature;
use lk_core::providers::{ProfileUpdate, Session, User};
use serde::{Deserialize, Serialize};

use crate::routes::respond::{from_core, not_found, require_field, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    expires_at: String,
    user: User,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.access_token,
            expires_at: session.expires_at.to_rfc3339(),
            user: session.user,
        }
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    require_field(&req.email, "email")?;
    require_field(&req.password, "password")?;

    let session = state
        .auth()
        .sign_up(&req.email, &req.password, req.name.as_deref())
        .await
        .map_err(from_core)?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    require_field(&req.email, "email")?;
    require_field(&req.password, "password")?;

    let session = state
        .auth()
        .sign_in(&req.email, &req.password)
        .await
        .map_err(from_core)?;
    Ok(Json(session.into()))
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    state.auth().sign_out().await.map_err(from_core)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>) -> Result<Json<User>, RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    let user = state
        .auth()
        .current_user()
        .await
        .map_err(from_core)?
        .ok_or_else(|| not_found("No active session"))?;
    Ok(Json(user))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode, RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    require_field(&req.email, "email")?;
    state
        .auth()
        .reset_password(&req.email)
        .await
        .map_err(from_core)?;
    Ok(StatusCode::ACCEPTED)
}

async fn update_profile(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, RouteError> {
    state
        .registry()
        .require_feature(Feature::Auth)
        .map_err(from_core)?;
    let user = state
        .auth()
        .update_profile(update)
        .await
        .map_err(from_core)?;
    Ok(Json(user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/reset-password", post(reset_password))
        .route("/api/v1/auth/profile", post(update_profile))
}
