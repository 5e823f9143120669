//! Application state

use std::sync::Arc;

use lk_core::config::ConfigRegistry;
use lk_core::providers::{AuthProvider, DatabaseProvider, PaymentsProvider, Providers};

/// Shared application state: the write-once configuration registry and the
/// provider bundle selected at startup, passed explicitly to every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: ConfigRegistry,
    providers: Providers,
}

impl AppState {
    pub fn new(registry: ConfigRegistry, providers: Providers) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                providers,
            }),
        }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.inner.registry
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.inner.providers.auth
    }

    pub fn database(&self) -> &DatabaseProvider {
        &self.inner.providers.database
    }

    pub fn payments(&self) -> &PaymentsProvider {
        &self.inner.providers.payments
    }
}
