//! CRUD endpoints over the application collections.
//!
//! Same database provider underneath as the generic query endpoint, but
//! with a REST-shaped surface restricted to the known collections.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use lk_core::config::Feature;
use lk_core::providers::Record;
use serde_json::{Map, Value};

use crate::routes::respond::{bad_request, from_core, not_found, RouteError};
use crate::state::AppState;

const COLLECTIONS: [&str; 4] = ["users", "products", "orders", "files"];

fn check_collection(collection: &str) -> Result<(), RouteError> {
    if COLLECTIONS.contains(&collection) {
        return Ok(());
    }
    Err(bad_request(format!(
        "Unknown collection '{}'; expected one of {}",
        collection,
        COLLECTIONS.join(", ")
    )))
}

fn gate(state: &AppState, collection: &str) -> Result<(), RouteError> {
    state
        .registry()
        .require_feature(Feature::Database)
        .map_err(from_core)?;
    check_collection(collection)
}

async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(filter): Query<Map<String, Value>>,
) -> Result<Json<Vec<Record>>, RouteError> {
    gate(&state, &collection)?;
    let records = state
        .database()
        .find_many(&collection, &filter)
        .await
        .map_err(from_core)?;
    Ok(Json(records))
}

async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(data): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Record>), RouteError> {
    gate(&state, &collection)?;
    let record = state
        .database()
        .insert(&collection, data)
        .await
        .map_err(from_core)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Record>, RouteError> {
    gate(&state, &collection)?;
    let record = state
        .database()
        .find_by_id(&collection, &id)
        .await
        .map_err(from_core)?
        .ok_or_else(|| not_found(format!("No record '{}' in '{}'", id, collection)))?;
    Ok(Json(record))
}

async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(data): Json<Map<String, Value>>,
) -> Result<Json<Record>, RouteError> {
    gate(&state, &collection)?;
    let record = state
        .database()
        .update(&collection, &id, data)
        .await
        .map_err(from_core)?;
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, RouteError> {
    gate(&state, &collection)?;
    state
        .database()
        .delete(&collection, &id)
        .await
        .map_err(from_core)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    // Static routes elsewhere in the API ("/api/v1/health", "/api/v1/config",
    // "/api/v1/auth/…") take priority over these captures when merged.
    Router::new()
        .route(
            "/api/v1/{collection}",
            get(list_records).post(create_record),
        )
        .route(
            "/api/v1/{collection}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
}
