use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Cross-cutting capabilities that can be toggled per deployment.
///
/// The set is closed on purpose: looking up a name outside it is an
/// [`Error::UnknownCapability`], not a silent `false`, so typos in callers
/// surface immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Auth,
    Database,
    Payments,
    Realtime,
    Analytics,
    Email,
    FileUpload,
    Notifications,
}

impl Feature {
    pub const ALL: [Self; 8] = [
        Self::Auth,
        Self::Database,
        Self::Payments,
        Self::Realtime,
        Self::Analytics,
        Self::Email,
        Self::FileUpload,
        Self::Notifications,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Database => "database",
            Self::Payments => "payments",
            Self::Realtime => "realtime",
            Self::Analytics => "analytics",
            Self::Email => "email",
            Self::FileUpload => "file_upload",
            Self::Notifications => "notifications",
        }
    }

    /// Environment key whose value must be exactly `"true"` to enable.
    pub fn env_key(self) -> &'static str {
        match self {
            Self::Auth => "LK_ENABLE_AUTH",
            Self::Database => "LK_ENABLE_DATABASE",
            Self::Payments => "LK_ENABLE_PAYMENTS",
            Self::Realtime => "LK_ENABLE_REALTIME",
            Self::Analytics => "LK_ENABLE_ANALYTICS",
            Self::Email => "LK_ENABLE_EMAIL",
            Self::FileUpload => "LK_ENABLE_FILE_UPLOAD",
            Self::Notifications => "LK_ENABLE_NOTIFICATIONS",
        }
    }

    /// Baseline requirement for the feature; deployments extend the set
    /// through `LK_REQUIRED_FEATURES` at load time.
    pub fn required(self) -> bool {
        false
    }

    /// User-facing description of what happens while the feature is off.
    pub fn fallback(self) -> &'static str {
        match self {
            Self::Auth => "Authentication is disabled; sign-in and sign-up are unavailable",
            Self::Database => "Database is disabled; records cannot be read or written",
            Self::Payments => "Payments are disabled; checkout is unavailable",
            Self::Realtime => "Realtime updates are disabled; clients must poll",
            Self::Analytics => "Analytics are disabled; no usage events are collected",
            Self::Email => "Email is disabled; no messages are sent",
            Self::FileUpload => "File upload is disabled; attachments are rejected",
            Self::Notifications => "Notifications are disabled; no alerts are delivered",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "auth" => Ok(Self::Auth),
            "database" => Ok(Self::Database),
            "payments" => Ok(Self::Payments),
            "realtime" => Ok(Self::Realtime),
            "analytics" => Ok(Self::Analytics),
            "email" => Ok(Self::Email),
            "file_upload" => Ok(Self::FileUpload),
            "notifications" => Ok(Self::Notifications),
            _ => Err(Error::UnknownCapability(format!(
                "Unknown feature '{}'",
                value
            ))),
        }
    }
}

/// Hosted services a feature can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    HostedDb,
    HostedPayments,
    HostedAuth,
    HostedEmail,
    HostedStorage,
}

impl Provider {
    pub const ALL: [Self; 5] = [
        Self::HostedDb,
        Self::HostedPayments,
        Self::HostedAuth,
        Self::HostedEmail,
        Self::HostedStorage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostedDb => "hosted_db",
            Self::HostedPayments => "hosted_payments",
            Self::HostedAuth => "hosted_auth",
            Self::HostedEmail => "hosted_email",
            Self::HostedStorage => "hosted_storage",
        }
    }

    /// Credential keys that must all be present and non-blank for the
    /// provider to count as configured. Partial credentials fail closed.
    pub fn credential_keys(self) -> &'static [&'static str] {
        match self {
            Self::HostedDb => &["LK_DATABASE_URL", "LK_DATABASE_ANON_KEY"],
            Self::HostedPayments => &[
                "LK_PAYMENTS_PUBLISHABLE_KEY",
                "LK_PAYMENTS_SECRET_KEY",
                "LK_PAYMENTS_WEBHOOK_SECRET",
            ],
            Self::HostedAuth => &["LK_AUTH_DOMAIN", "LK_AUTH_CLIENT_ID", "LK_AUTH_CLIENT_SECRET"],
            Self::HostedEmail => &["LK_EMAIL_API_KEY"],
            Self::HostedStorage => &[
                "LK_STORAGE_ACCESS_KEY",
                "LK_STORAGE_SECRET_KEY",
                "LK_STORAGE_REGION",
            ],
        }
    }

    pub fn required(self) -> bool {
        false
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "hosted_db" => Ok(Self::HostedDb),
            "hosted_payments" => Ok(Self::HostedPayments),
            "hosted_auth" => Ok(Self::HostedAuth),
            "hosted_email" => Ok(Self::HostedEmail),
            "hosted_storage" => Ok(Self::HostedStorage),
            _ => Err(Error::UnknownCapability(format!(
                "Unknown provider '{}'",
                value
            ))),
        }
    }
}

/// Immutable snapshot of one feature toggle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    pub name: Feature,
    pub enabled: bool,
    pub required: bool,
    pub fallback: String,
}

/// Immutable snapshot of one provider's configuration.
///
/// `enabled` is derived at load time; credentials are never re-read.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: Provider,
    pub enabled: bool,
    pub required: bool,
    credentials: HashMap<String, String>,
}

impl ProviderConfig {
    pub(crate) fn new(
        name: Provider,
        enabled: bool,
        credentials: HashMap<String, String>,
    ) -> Self {
        Self {
            name,
            enabled,
            required: name.required(),
            credentials,
        }
    }

    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).map(String::as_str)
    }

    /// Credential lookup for code paths that must not run unconfigured.
    pub fn require_credential(&self, key: &str) -> crate::Result<&str> {
        self.credential(key).ok_or_else(|| {
            Error::ProviderNotConfigured(format!(
                "Provider '{}' is missing credential {}",
                self.name, key
            ))
        })
    }
}

/// Static presentation metadata passed through to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMeta {
    pub theme: String,
    pub primary_color: String,
    pub show_branding: bool,
    pub enable_animations: bool,
    pub app_name: String,
    pub app_description: String,
    pub app_url: String,
    pub support_email: String,
}

impl AppMeta {
    pub(crate) fn from_env(env: &HashMap<String, String>) -> Self {
        Self {
            theme: env_or(env, "LK_THEME", "light"),
            primary_color: env_or(env, "LK_PRIMARY_COLOR", "#6366f1"),
            show_branding: env.get("LK_SHOW_BRANDING").map(String::as_str) != Some("false"),
            enable_animations: env.get("LK_ENABLE_ANIMATIONS").map(String::as_str)
                != Some("false"),
            app_name: env_or(env, "LK_APP_NAME", "LaunchKit"),
            app_description: env_or(env, "LK_APP_DESCRIPTION", "A starter kit for web apps"),
            app_url: env_or(env, "LK_APP_URL", "http://localhost:8080"),
            support_email: env_or(env, "LK_SUPPORT_EMAIL", "support@example.com"),
        }
    }
}

fn env_or(env: &HashMap<String, String>, key: &str, default: &str) -> String {
    env.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Execution mode, from `LK_ENV`. Anything unrecognized counts as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Development,
    Test,
    Production,
}

impl RuntimeMode {
    pub(crate) fn from_env(env: &HashMap<String, String>) -> Self {
        match env.get("LK_ENV").map(|value| value.trim().to_lowercase()) {
            Some(value) if value == "production" => Self::Production,
            Some(value) if value == "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}
