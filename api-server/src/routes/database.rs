//! Generic query endpoint dispatching to the selected database provider.

use axum::{extract::State, routing::post, Json, Router};
use lk_core::config::Feature;
use lk_core::providers::Record;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::routes::respond::{bad_request, from_core, not_found, RouteError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Operation {
    Create,
    Update,
    Delete,
    FindById,
    FindMany,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    operation: Operation,
    collection: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    filter: Option<Map<String, Value>>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase", untagged)]
enum QueryResponse {
    One(Record),
    Many(Vec<Record>),
    None { deleted: bool },
}

fn required_id(id: Option<String>) -> Result<String, RouteError> {
    id.filter(|value| !value.trim().is_empty())
        .ok_or_else(|| bad_request("Missing required field 'id'"))
}

async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, RouteError> {
    state
        .registry()
        .require_feature(Feature::Database)
        .map_err(from_core)?;

    let database = state.database();
    let response = match req.operation {
        Operation::Create => {
            let data = req
                .data
                .ok_or_else(|| bad_request("Missing required field 'data'"))?;
            QueryResponse::One(
                database
                    .insert(&req.collection, data)
                    .await
                    .map_err(from_core)?,
            )
        }
        Operation::Update => {
            let id = required_id(req.id)?;
            let data = req
                .data
                .ok_or_else(|| bad_request("Missing required field 'data'"))?;
            QueryResponse::One(
                database
                    .update(&req.collection, &id, data)
                    .await
                    .map_err(from_core)?,
            )
        }
        Operation::Delete => {
            let id = required_id(req.id)?;
            database
                .delete(&req.collection, &id)
                .await
                .map_err(from_core)?;
            QueryResponse::None { deleted: true }
        }
        Operation::FindById => {
            let id = required_id(req.id)?;
            let record = database
                .find_by_id(&req.collection, &id)
                .await
                .map_err(from_core)?
                .ok_or_else(|| {
                    not_found(format!("No record '{}' in '{}'", id, req.collection))
                })?;
            QueryResponse::One(record)
        }
        Operation::FindMany => QueryResponse::Many(
            database
                .find_many(&req.collection, &req.filter.unwrap_or_default())
                .await
                .map_err(from_core)?,
        ),
    };
    Ok(Json(response))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/database/query", post(query))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_support::build_state;

    fn query_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/database/query")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn payload(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn create_then_find_by_id_round_trips() {
        let state = build_state(&[("LK_ENABLE_DATABASE", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .clone()
            .oneshot(query_request(json!({
                "operation": "create",
                "collection": "products",
                "data": { "name": "Boots", "category": "shoes" }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = payload(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(query_request(json!({
                "operation": "findById",
                "collection": "products",
                "id": id
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(payload(response).await, created);
    }

    #[tokio::test]
    async fn find_many_applies_the_filter() {
        let state = build_state(&[("LK_ENABLE_DATABASE", "true")]);
        let app = super::router().with_state(state);

        for (name, category) in [("Boots", "shoes"), ("Cap", "hats"), ("Sneakers", "shoes")] {
            let response = app
                .clone()
                .oneshot(query_request(json!({
                    "operation": "create",
                    "collection": "products",
                    "data": { "name": name, "category": category }
                })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(query_request(json!({
                "operation": "findMany",
                "collection": "products",
                "filter": { "category": "shoes" }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let records = payload(response).await;
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Boots");
        assert_eq!(records[1]["name"], "Sneakers");
    }

    #[tokio::test]
    async fn find_by_id_on_missing_record_returns_404() {
        let state = build_state(&[("LK_ENABLE_DATABASE", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(query_request(json!({
                "operation": "findById",
                "collection": "products",
                "id": "nope"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn query_is_gated_on_the_database_feature() {
        let state = build_state(&[]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(query_request(json!({
                "operation": "findMany",
                "collection": "products"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_requires_an_id() {
        let state = build_state(&[("LK_ENABLE_DATABASE", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(query_request(json!({
                "operation": "update",
                "collection": "products",
                "data": { "name": "Boots" }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
