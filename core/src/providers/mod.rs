//! Provider variants and selection.
//!
//! Each capability domain (auth, database, payments) is a closed enum over
//! the interchangeable implementations: a hosted-service adapter, an
//! in-memory fallback or mock for non-production modes, and a disabled stub.
//! Selection happens once per process in [`Providers::from_registry`]; the
//! chosen variant is immutable for the process lifetime. Every operation on
//! every variant returns a `Result` — a disabled or unconfigured provider
//! answers with a typed error, never a crash.

pub mod auth;
pub mod database;
pub mod payments;

pub use auth::{AuthProvider, ProfileUpdate, Session, User};
pub use database::{DatabaseProvider, Record};
pub use payments::{CheckoutRequest, CheckoutSession, PaymentsProvider};

use crate::config::ConfigRegistry;
use crate::Result;

/// The per-process provider bundle, built once at startup and shared
/// read-only with every consumer.
pub struct Providers {
    pub auth: AuthProvider,
    pub database: DatabaseProvider,
    pub payments: PaymentsProvider,
}

impl Providers {
    /// Run the three factories against the registry.
    ///
    /// Only the database factory is fallible: in production with no database
    /// provider configured it refuses to construct, while auth and payments
    /// degrade to their disabled stubs.
    pub fn from_registry(registry: &ConfigRegistry) -> Result<Self> {
        Ok(Self {
            auth: AuthProvider::select(registry),
            database: DatabaseProvider::select(registry)?,
            payments: PaymentsProvider::select(registry),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;

    fn registry(pairs: &[(&str, &str)]) -> ConfigRegistry {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ConfigRegistry::load(&env)
    }

    #[test]
    fn development_bundle_falls_back_to_local_implementations() {
        let registry = registry(&[
            ("LK_ENABLE_AUTH", "true"),
            ("LK_ENABLE_DATABASE", "true"),
            ("LK_ENABLE_PAYMENTS", "true"),
        ]);
        let providers = Providers::from_registry(&registry).unwrap();
        assert_eq!(providers.auth.kind(), "mock");
        assert_eq!(providers.database.kind(), "local");
        assert_eq!(providers.payments.kind(), "mock");
    }

    #[test]
    fn unconfigured_production_fails_only_for_the_database() {
        let registry = registry(&[
            ("LK_ENABLE_AUTH", "true"),
            ("LK_ENABLE_DATABASE", "true"),
            ("LK_ENV", "production"),
        ]);
        // Auth degrades silently while the database refuses to construct.
        assert_eq!(AuthProvider::select(&registry).kind(), "disabled");
        assert!(matches!(
            Providers::from_registry(&registry),
            Err(Error::ProviderNotConfigured(_))
        ));
    }
}
