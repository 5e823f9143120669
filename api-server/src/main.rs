//! API Server for LaunchKit
//!
//! Loads the configuration registry from the environment, selects a provider
//! for each enabled capability, and serves the REST API.

mod routes;
mod state;

use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lk_core::config::ConfigRegistry;
use lk_core::providers::Providers;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=debug,lk_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = ConfigRegistry::from_process_env();

    // Configuration problems are reported, not thrown; in production they
    // deserve error-level visibility, elsewhere the local fallbacks make
    // them survivable.
    let report = registry.validate();
    for error in &report.errors {
        if registry.mode().is_production() {
            tracing::error!("Configuration: {}", error);
        } else {
            tracing::warn!("Configuration: {}", error);
        }
    }

    let providers =
        Providers::from_registry(&registry).expect("Failed to initialize providers");
    tracing::info!(
        "Providers selected: auth={}, database={}, payments={}",
        providers.auth.kind(),
        providers.database.kind(),
        providers.payments.kind()
    );

    let app_state = AppState::new(registry, providers);

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::config::router())
        .merge(routes::auth::router())
        .merge(routes::payments::router())
        .merge(routes::database::router())
        .merge(routes::records::router())
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("LK_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("REST API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
