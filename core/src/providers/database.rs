//! Database providers.
//!
//! The hosted variant adapts the REST surface of the hosted database
//! service; the local variant is an in-memory fallback for development and
//! test runs, with contents lost on process exit. Unlike auth and payments,
//! running in production with nothing configured is a construction-time
//! error rather than a silent downgrade.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{ConfigRegistry, Feature, Provider, ProviderConfig};
use crate::error::Error;
use crate::Result;

/// A stored record: server-assigned id and timestamps plus the caller's
/// fields, flattened into one JSON object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn disabled() -> Error {
    Error::CapabilityDisabled(Feature::Database.fallback().to_string())
}

/// Reserved keys are always server-assigned; strip them from caller input
/// so they cannot collide with the flattened representation.
fn sanitize_fields(mut data: Map<String, Value>) -> Map<String, Value> {
    data.remove("id");
    data.remove("createdAt");
    data.remove("updatedAt");
    data
}

fn validate_collection(collection: &str) -> Result<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Invalid collection name '{}'",
            collection
        )))
    }
}

pub enum DatabaseProvider {
    Hosted(HostedDbClient),
    Local(LocalStore),
    Disabled,
}

impl DatabaseProvider {
    /// Select the database implementation for this process.
    ///
    /// Production with no configured provider refuses to construct; the
    /// database is the one capability that must not degrade silently.
    pub fn select(registry: &ConfigRegistry) -> Result<Self> {
        if !registry.is_feature_enabled(Feature::Database) {
            return Ok(Self::Disabled);
        }
        if registry.is_provider_enabled(Provider::HostedDb) {
            let client = HostedDbClient::new(registry.provider_config(Provider::HostedDb))?;
            return Ok(Self::Hosted(client));
        }
        if !registry.mode().is_production() {
            tracing::warn!(
                "No database provider configured; using in-memory store (data is lost on exit)"
            );
            return Ok(Self::Local(LocalStore::new()));
        }
        Err(Error::ProviderNotConfigured(
            "Database required in production but no provider is configured".to_string(),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted(_) => "hosted",
            Self::Local(_) => "local",
            Self::Disabled => "disabled",
        }
    }

    pub async fn insert(&self, collection: &str, data: Map<String, Value>) -> Result<Record> {
        validate_collection(collection)?;
        match self {
            Self::Hosted(client) => client.insert(collection, sanitize_fields(data)).await,
            Self::Local(store) => store.insert(collection, sanitize_fields(data)).await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Record> {
        validate_collection(collection)?;
        match self {
            Self::Hosted(client) => client.update(collection, id, sanitize_fields(data)).await,
            Self::Local(store) => store.update(collection, id, sanitize_fields(data)).await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        validate_collection(collection)?;
        match self {
            Self::Hosted(client) => client.delete(collection, id).await,
            Self::Local(store) => store.delete(collection, id).await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        validate_collection(collection)?;
        match self {
            Self::Hosted(client) => client.find_by_id(collection, id).await,
            Self::Local(store) => Ok(store.find_by_id(collection, id).await),
            Self::Disabled => Err(disabled()),
        }
    }

    /// Equality filter over record fields; matching records come back in
    /// insertion order.
    pub async fn find_many(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Record>> {
        validate_collection(collection)?;
        match self {
            Self::Hosted(client) => client.find_many(collection, filter).await,
            Self::Local(store) => Ok(store.find_many(collection, filter).await),
            Self::Disabled => Err(disabled()),
        }
    }
}

// --- Local (in-memory fallback) ---

#[derive(Default)]
pub struct LocalStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, collection: &str, data: Map<String, Value>) -> Result<Record> {
        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            fields: data,
        };
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<Record> {
        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found(collection, id))?;
        record.fields.extend(data);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|records| records.iter().find(|record| record.id == id).cloned())
    }

    async fn find_many(&self, collection: &str, filter: &Map<String, Value>) -> Vec<Record> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        filter
                            .iter()
                            .all(|(key, value)| record.fields.get(key) == Some(value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn not_found(collection: &str, id: &str) -> Error {
    Error::NotFound(format!("No record '{}' in '{}'", id, collection))
}

// --- Hosted (REST adapter) ---

pub struct HostedDbClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HostedDbClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.require_credential("LK_DATABASE_URL")?.to_string();
        let anon_key = config.require_credential("LK_DATABASE_ANON_KEY")?.to_string();
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn insert(&self, collection: &str, data: Map<String, Value>) -> Result<Record> {
        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            fields: data,
        };
        let response = self
            .request(reqwest::Method::POST, self.collection_url(collection))
            .header("Prefer", "return=representation")
            .json(&vec![&record])
            .send()
            .await?;
        let response = expect_success(response).await?;
        let mut records: Vec<Record> = response.json().await?;
        records
            .pop()
            .ok_or_else(|| Error::Upstream("Insert returned no representation".to_string()))
    }

    async fn update(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<Record> {
        let mut patch = data;
        patch.insert("updatedAt".to_string(), serde_json::json!(Utc::now()));
        let response = self
            .request(
                reqwest::Method::PATCH,
                format!(
                    "{}?id=eq.{}",
                    self.collection_url(collection),
                    urlencoding::encode(id)
                ),
            )
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let response = expect_success(response).await?;
        let mut records: Vec<Record> = response.json().await?;
        records.pop().ok_or_else(|| not_found(collection, id))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                format!(
                    "{}?id=eq.{}",
                    self.collection_url(collection),
                    urlencoding::encode(id)
                ),
            )
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = expect_success(response).await?;
        let records: Vec<Record> = response.json().await?;
        if records.is_empty() {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let response = self
            .request(
                reqwest::Method::GET,
                format!(
                    "{}?id=eq.{}",
                    self.collection_url(collection),
                    urlencoding::encode(id)
                ),
            )
            .send()
            .await?;
        let response = expect_success(response).await?;
        let mut records: Vec<Record> = response.json().await?;
        Ok(records.pop())
    }

    async fn find_many(&self, collection: &str, filter: &Map<String, Value>) -> Result<Vec<Record>> {
        let mut url = self.collection_url(collection);
        let mut separator = '?';
        for (key, value) in filter {
            let raw = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            url.push(separator);
            url.push_str(&format!(
                "{}=eq.{}",
                urlencoding::encode(key),
                urlencoding::encode(&raw)
            ));
            separator = '&';
        }
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let response = expect_success(response).await?;
        Ok(response.json().await?)
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
