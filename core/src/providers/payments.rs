//! Payments providers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{ConfigRegistry, Feature, Provider, ProviderConfig};
use crate::error::Error;
use crate::Result;

const HOSTED_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default)]
    pub customer_email: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub status: String,
}

fn disabled() -> Error {
    Error::CapabilityDisabled(Feature::Payments.fallback().to_string())
}

pub enum PaymentsProvider {
    Hosted(HostedPaymentsClient),
    Mock(MockPayments),
    Disabled,
}

impl PaymentsProvider {
    /// Select the payments implementation: feature off → disabled stub;
    /// hosted processor configured → its adapter; non-production → mock;
    /// production unconfigured → disabled stub.
    pub fn select(registry: &ConfigRegistry) -> Self {
        if !registry.is_feature_enabled(Feature::Payments) {
            return Self::Disabled;
        }
        if registry.is_provider_enabled(Provider::HostedPayments) {
            if let Ok(client) =
                HostedPaymentsClient::new(registry.provider_config(Provider::HostedPayments))
            {
                return Self::Hosted(client);
            }
        }
        if !registry.mode().is_production() {
            tracing::warn!("No payments provider configured; using mock checkout sessions");
            return Self::Mock(MockPayments::new(registry.meta().app_url.clone()));
        }
        Self::Disabled
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted(_) => "hosted",
            Self::Mock(_) => "mock",
            Self::Disabled => "disabled",
        }
    }

    pub async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        match self {
            Self::Hosted(client) => client.create_checkout(request).await,
            Self::Mock(mock) => Ok(mock.create_checkout(request).await),
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn get_session(&self, id: &str) -> Result<CheckoutSession> {
        match self {
            Self::Hosted(client) => client.get_session(id).await,
            Self::Mock(mock) => mock.get_session(id).await,
            Self::Disabled => Err(disabled()),
        }
    }
}

// --- Hosted (payment processor API) ---

#[derive(Debug, Deserialize)]
struct WireSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    status: String,
}

pub struct HostedPaymentsClient {
    http: reqwest::Client,
    secret_key: String,
}

impl HostedPaymentsClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            secret_key: config.require_credential("LK_PAYMENTS_SECRET_KEY")?.to_string(),
        })
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let quantity = request.quantity.to_string();
        let mut form = vec![
            ("mode", "payment"),
            ("line_items[0][price]", request.price_id.as_str()),
            ("line_items[0][quantity]", quantity.as_str()),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
        ];
        if let Some(email) = request.customer_email.as_deref() {
            form.push(("customer_email", email));
        }
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", HOSTED_API_BASE))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let response = expect_success(response).await?;
        let wire: WireSession = response.json().await?;
        Ok(CheckoutSession {
            url: wire.url.ok_or_else(|| {
                Error::Upstream("Checkout session has no redirect URL".to_string())
            })?,
            id: wire.id,
            status: wire.status,
        })
    }

    async fn get_session(&self, id: &str) -> Result<CheckoutSession> {
        let response = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                HOSTED_API_BASE,
                urlencoding::encode(id)
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("No checkout session '{}'", id)));
        }
        let response = expect_success(response).await?;
        let wire: WireSession = response.json().await?;
        Ok(CheckoutSession {
            url: wire.url.unwrap_or_default(),
            id: wire.id,
            status: wire.status,
        })
    }
}

// --- Mock (non-production only) ---

pub struct MockPayments {
    app_url: String,
    sessions: RwLock<HashMap<String, CheckoutSession>>,
}

impl MockPayments {
    pub fn new(app_url: String) -> Self {
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn create_checkout(&self, _request: &CheckoutRequest) -> CheckoutSession {
        let id = format!("cs_mock_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            url: format!("{}/mock/checkout/{}", self.app_url, id),
            id: id.clone(),
            status: "open".to_string(),
        };
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    async fn get_session(&self, id: &str) -> Result<CheckoutSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No checkout session '{}'", id)))
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Upstream(format!("{}: {}", status, body)))
}
