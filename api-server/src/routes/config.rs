//! Public configuration snapshot.
//!
//! Clients read this once at load to know which features to render and how
//! to brand themselves; credentials never appear here.

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use lk_core::config::{AppMeta, Feature};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderKinds {
    auth: &'static str,
    database: &'static str,
    payments: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigSnapshot {
    features: BTreeMap<&'static str, bool>,
    providers: ProviderKinds,
    meta: AppMeta,
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigSnapshot> {
    let registry = state.registry();
    let features = Feature::ALL
        .into_iter()
        .map(|feature| (feature.as_str(), registry.is_feature_enabled(feature)))
        .collect();
    Json(ConfigSnapshot {
        features,
        providers: ProviderKinds {
            auth: state.auth().kind(),
            database: state.database().kind(),
            payments: state.payments().kind(),
        },
        meta: registry.meta().clone(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/config", get(get_config))
}
