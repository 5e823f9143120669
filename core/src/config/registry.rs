use std::collections::HashMap;

use serde::Serialize;

use super::model::{AppMeta, Feature, FeatureFlag, Provider, ProviderConfig, RuntimeMode};
use crate::error::Error;

/// Outcome of [`ConfigRegistry::validate`]. Pure data; the caller decides
/// whether a failing report aborts startup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Process-wide configuration, loaded once and never mutated.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    features: HashMap<Feature, FeatureFlag>,
    providers: HashMap<Provider, ProviderConfig>,
    meta: AppMeta,
    mode: RuntimeMode,
}

impl ConfigRegistry {
    /// Build the registry from an environment mapping.
    ///
    /// Deterministic and side-effect-free besides reading `env`. A feature is
    /// enabled iff its key holds the literal string `"true"`; `"TRUE"`, `"1"`
    /// and unset all mean disabled. A provider is enabled iff every one of
    /// its credential keys is present and non-blank.
    pub fn load(env: &HashMap<String, String>) -> Self {
        let required = required_features(env);
        let features = Feature::ALL
            .into_iter()
            .map(|feature| {
                let enabled = env.get(feature.env_key()).map(String::as_str) == Some("true");
                let flag = FeatureFlag {
                    name: feature,
                    enabled,
                    required: feature.required() || required.contains(&feature),
                    fallback: feature.fallback().to_string(),
                };
                (feature, flag)
            })
            .collect();

        let providers = Provider::ALL
            .into_iter()
            .map(|provider| {
                let credentials: HashMap<String, String> = provider
                    .credential_keys()
                    .iter()
                    .filter_map(|key| {
                        env.get(*key)
                            .map(|value| value.trim().to_string())
                            .filter(|value| !value.is_empty())
                            .map(|value| ((*key).to_string(), value))
                    })
                    .collect();
                let enabled = credentials.len() == provider.credential_keys().len();
                (provider, ProviderConfig::new(provider, enabled, credentials))
            })
            .collect();

        Self {
            features,
            providers,
            meta: AppMeta::from_env(env),
            mode: RuntimeMode::from_env(env),
        }
    }

    /// Load from the real process environment.
    pub fn from_process_env() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load(&env)
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.feature_flag(feature).enabled
    }

    pub fn is_provider_enabled(&self, provider: Provider) -> bool {
        self.provider_config(provider).enabled
    }

    pub fn feature_flag(&self, feature: Feature) -> &FeatureFlag {
        // Every variant is inserted by load(); the lookup cannot miss.
        &self.features[&feature]
    }

    pub fn feature_fallback(&self, feature: Feature) -> &str {
        &self.feature_flag(feature).fallback
    }

    pub fn provider_config(&self, provider: Provider) -> &ProviderConfig {
        &self.providers[&provider]
    }

    pub fn meta(&self) -> &AppMeta {
        &self.meta
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Short-circuit helper for handlers: `CapabilityDisabled` carrying the
    /// feature's fallback description when the flag is off.
    pub fn require_feature(&self, feature: Feature) -> crate::Result<()> {
        if self.is_feature_enabled(feature) {
            Ok(())
        } else {
            Err(Error::CapabilityDisabled(
                self.feature_fallback(feature).to_string(),
            ))
        }
    }

    /// Check cross-cutting invariants: required features must be on, and a
    /// feature backed by a hosted provider must have that provider
    /// configured. One error per violation, in declaration order.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        for feature in Feature::ALL {
            let flag = self.feature_flag(feature);
            if flag.required && !flag.enabled {
                errors.push(format!("Required feature '{}' is disabled", feature));
            }
        }

        let dependencies = [
            (Feature::Database, Provider::HostedDb),
            (Feature::Payments, Provider::HostedPayments),
            (Feature::Email, Provider::HostedEmail),
        ];
        for (feature, provider) in dependencies {
            if self.is_feature_enabled(feature) && !self.is_provider_enabled(provider) {
                errors.push(format!(
                    "Feature '{}' is enabled but provider '{}' is not configured",
                    feature, provider
                ));
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Deployments mark must-have features via `LK_REQUIRED_FEATURES`
/// (comma-separated feature names); `validate()` then reports any of them
/// that are off. Unknown names are logged and skipped.
fn required_features(env: &HashMap<String, String>) -> Vec<Feature> {
    env.get("LK_REQUIRED_FEATURES")
        .map(|raw| {
            raw.split(',')
                .filter(|name| !name.trim().is_empty())
                .filter_map(|name| match name.parse::<Feature>() {
                    Ok(feature) => Some(feature),
                    Err(_) => {
                        tracing::warn!(
                            "Ignoring unknown feature '{}' in LK_REQUIRED_FEATURES",
                            name.trim()
                        );
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;

    use super::*;
    use crate::error::Error;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn db_credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("LK_DATABASE_URL", "https://db.example.com"),
            ("LK_DATABASE_ANON_KEY", "anon-key"),
        ]
    }

    #[test]
    fn feature_enabled_requires_literal_true() {
        for (value, expected) in [
            ("true", true),
            ("TRUE", false),
            ("1", false),
            ("yes", false),
            ("", false),
        ] {
            let registry = ConfigRegistry::load(&env(&[("LK_ENABLE_AUTH", value)]));
            assert_eq!(
                registry.is_feature_enabled(Feature::Auth),
                expected,
                "value {:?}",
                value
            );
        }

        let registry = ConfigRegistry::load(&env(&[]));
        assert!(!registry.is_feature_enabled(Feature::Auth));
    }

    #[test]
    fn provider_enabled_requires_every_credential() {
        let full = db_credentials();
        let registry = ConfigRegistry::load(&env(&full));
        assert!(registry.is_provider_enabled(Provider::HostedDb));

        for missing in 0..full.len() {
            let partial: Vec<_> = full
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != missing)
                .map(|(_, pair)| *pair)
                .collect();
            let registry = ConfigRegistry::load(&env(&partial));
            assert!(
                !registry.is_provider_enabled(Provider::HostedDb),
                "missing {:?} should fail closed",
                full[missing].0
            );
        }
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let registry = ConfigRegistry::load(&env(&[
            ("LK_DATABASE_URL", "https://db.example.com"),
            ("LK_DATABASE_ANON_KEY", "   "),
        ]));
        assert!(!registry.is_provider_enabled(Provider::HostedDb));
    }

    #[test]
    fn validate_reports_one_error_per_dependency_violation() {
        let registry = ConfigRegistry::load(&env(&[("LK_ENABLE_PAYMENTS", "true")]));
        let report = registry.validate();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("payments"));
        assert!(report.errors[0].contains("hosted_payments"));
    }

    #[test]
    fn validate_clears_when_provider_configured() {
        let mut pairs = vec![
            ("LK_ENABLE_PAYMENTS", "true"),
            ("LK_PAYMENTS_PUBLISHABLE_KEY", "pk_test"),
            ("LK_PAYMENTS_SECRET_KEY", "sk_test"),
            ("LK_PAYMENTS_WEBHOOK_SECRET", "whsec_test"),
        ];
        let report = ConfigRegistry::load(&env(&pairs)).validate();
        assert!(report.valid, "unexpected errors: {:?}", report.errors);

        pairs.pop();
        let report = ConfigRegistry::load(&env(&pairs)).validate();
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn validate_reports_each_violated_rule() {
        let registry = ConfigRegistry::load(&env(&[
            ("LK_ENABLE_DATABASE", "true"),
            ("LK_ENABLE_EMAIL", "true"),
        ]));
        let report = registry.validate();
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn required_features_come_from_the_environment() {
        let registry = ConfigRegistry::load(&env(&[("LK_REQUIRED_FEATURES", "payments")]));
        assert!(registry.feature_flag(Feature::Payments).required);
        let report = registry.validate();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Required feature 'payments' is disabled"));

        let registry = ConfigRegistry::load(&env(&[
            ("LK_REQUIRED_FEATURES", "payments"),
            ("LK_ENABLE_PAYMENTS", "true"),
            ("LK_PAYMENTS_PUBLISHABLE_KEY", "pk_test"),
            ("LK_PAYMENTS_SECRET_KEY", "sk_test"),
            ("LK_PAYMENTS_WEBHOOK_SECRET", "whsec_test"),
        ]));
        let report = registry.validate();
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn unknown_required_feature_names_are_skipped() {
        let registry =
            ConfigRegistry::load(&env(&[("LK_REQUIRED_FEATURES", "payments, paymentz")]));
        assert!(registry.feature_flag(Feature::Payments).required);
        assert!(!registry.feature_flag(Feature::Auth).required);
        assert_eq!(registry.validate().errors.len(), 1);
    }

    #[test]
    fn unknown_capability_names_are_rejected() {
        assert!(matches!(
            Feature::from_str("paymentz"),
            Err(Error::UnknownCapability(_))
        ));
        assert!(matches!(
            Provider::from_str("hosted_pigeons"),
            Err(Error::UnknownCapability(_))
        ));
        assert_eq!(Feature::from_str("payments").unwrap(), Feature::Payments);
    }

    #[test]
    fn require_feature_carries_fallback_description() {
        let registry = ConfigRegistry::load(&env(&[]));
        match registry.require_feature(Feature::Payments) {
            Err(Error::CapabilityDisabled(message)) => {
                assert_eq!(message, Feature::Payments.fallback());
            }
            other => panic!("expected CapabilityDisabled, got {:?}", other),
        }
    }

    #[test]
    fn mode_defaults_to_development() {
        let registry = ConfigRegistry::load(&env(&[]));
        assert_eq!(registry.mode(), RuntimeMode::Development);

        let registry = ConfigRegistry::load(&env(&[("LK_ENV", "production")]));
        assert!(registry.mode().is_production());
    }

    #[test]
    fn meta_falls_back_to_defaults() {
        let registry = ConfigRegistry::load(&env(&[("LK_APP_NAME", "  ")]));
        assert_eq!(registry.meta().app_name, "LaunchKit");
        assert_eq!(registry.meta().theme, "light");
        assert!(registry.meta().show_branding);
    }
}
