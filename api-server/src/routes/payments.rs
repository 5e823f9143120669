use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lk_core::config::Feature;
use lk_core::providers::{CheckoutRequest, CheckoutSession};

use crate::routes::respond::{from_core, require_field, RouteError};
use crate::state::AppState;

async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>), RouteError> {
    state
        .registry()
        .require_feature(Feature::Payments)
        .map_err(from_core)?;
    require_field(&req.price_id, "priceId")?;
    require_field(&req.success_url, "successUrl")?;
    require_field(&req.cancel_url, "cancelUrl")?;

    let session = state
        .payments()
        .create_checkout(&req)
        .await
        .map_err(from_core)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutSession>, RouteError> {
    state
        .registry()
        .require_feature(Feature::Payments)
        .map_err(from_core)?;
    let session = state.payments().get_session(&id).await.map_err(from_core)?;
    Ok(Json(session))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/payments/checkout", post(checkout))
        .route("/api/v1/payments/sessions/{id}", get(get_session))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_support::build_state;

    fn checkout_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/payments/checkout")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn checkout_creates_mock_session_in_dev_mode() {
        let state = build_state(&[("LK_ENABLE_PAYMENTS", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .clone()
            .oneshot(checkout_request(json!({
                "priceId": "price_basic",
                "successUrl": "http://localhost:8080/success",
                "cancelUrl": "http://localhost:8080/cancel"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        let session_id = payload["id"].as_str().unwrap();
        assert!(session_id.starts_with("cs_mock_"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/payments/sessions/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn checkout_is_gated_on_the_payments_feature() {
        let state = build_state(&[]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(checkout_request(json!({
                "priceId": "price_basic",
                "successUrl": "http://localhost:8080/success",
                "cancelUrl": "http://localhost:8080/cancel"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_requires_a_price_id() {
        let state = build_state(&[("LK_ENABLE_PAYMENTS", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(checkout_request(json!({
                "priceId": "",
                "successUrl": "http://localhost:8080/success",
                "cancelUrl": "http://localhost:8080/cancel"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_session_returns_404() {
        let state = build_state(&[("LK_ENABLE_PAYMENTS", "true")]);
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/payments/sessions/cs_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
