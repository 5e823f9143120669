//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    mode: String,
    auth_provider: String,
    database_provider: String,
    payments_provider: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: format!("{:?}", state.registry().mode()).to_lowercase(),
        auth_provider: state.auth().kind().to_string(),
        database_provider: state.database().kind().to_string(),
        payments_provider: state.payments().kind().to_string(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/health", get(health_check))
}
