//! Auth providers.
//!
//! The hosted variant talks to the auth API bundled with the hosted
//! database service; the alternate variant adapts a standalone identity
//! provider. Both keep a local session so `current_user` stays a pure read.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{ConfigRegistry, Feature, Provider, ProviderConfig};
use crate::error::Error;
use crate::Result;

const MOCK_TOKEN_TTL_SECONDS: i64 = 60 * 60 * 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Display name used when sign-in never received one: the local part of
/// the email address.
fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn disabled() -> Error {
    Error::CapabilityDisabled(Feature::Auth.fallback().to_string())
}

pub enum AuthProvider {
    Hosted(HostedAuthClient),
    Alternate(AlternateAuthClient),
    Mock(MockAuth),
    Disabled,
}

impl AuthProvider {
    /// Select the auth implementation for this process. First match wins:
    /// feature off → disabled stub; hosted database configured → its auth
    /// API; alternate identity provider configured → its adapter;
    /// non-production → in-memory mock; otherwise the disabled stub
    /// (production degrades silently, unlike the database factory).
    pub fn select(registry: &ConfigRegistry) -> Self {
        if !registry.is_feature_enabled(Feature::Auth) {
            return Self::Disabled;
        }
        if registry.is_provider_enabled(Provider::HostedDb) {
            if let Ok(client) = HostedAuthClient::new(registry.provider_config(Provider::HostedDb))
            {
                return Self::Hosted(client);
            }
        }
        if registry.is_provider_enabled(Provider::HostedAuth) {
            if let Ok(client) =
                AlternateAuthClient::new(registry.provider_config(Provider::HostedAuth))
            {
                return Self::Alternate(client);
            }
        }
        if !registry.mode().is_production() {
            tracing::warn!("No auth provider configured; using in-memory mock auth");
            return Self::Mock(MockAuth::new());
        }
        Self::Disabled
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted(_) => "hosted",
            Self::Alternate(_) => "alternate",
            Self::Mock(_) => "mock",
            Self::Disabled => "disabled",
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        match self {
            Self::Hosted(client) => client.sign_in(email, password).await,
            Self::Alternate(client) => client.sign_in(email, password).await,
            Self::Mock(mock) => mock.sign_in(email, password).await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session> {
        match self {
            Self::Hosted(client) => client.sign_up(email, password, name).await,
            Self::Alternate(client) => client.sign_up(email, password, name).await,
            Self::Mock(mock) => mock.sign_up(email, password, name).await,
            Self::Disabled => Err(disabled()),
        }
    }

    /// Unconditional transition to Unauthenticated; a no-op when there is
    /// no active session.
    pub async fn sign_out(&self) -> Result<()> {
        match self {
            Self::Hosted(client) => client.sign_out().await,
            Self::Alternate(client) => client.sign_out().await,
            Self::Mock(mock) => mock.sign_out().await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        match self {
            Self::Hosted(client) => Ok(client.current_user().await),
            Self::Alternate(client) => Ok(client.current_user().await),
            Self::Mock(mock) => Ok(mock.current_user().await),
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        match self {
            Self::Hosted(client) => client.reset_password(email).await,
            Self::Alternate(client) => client.reset_password(email).await,
            Self::Mock(mock) => mock.reset_password(email).await,
            Self::Disabled => Err(disabled()),
        }
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        match self {
            Self::Hosted(client) => client.update_profile(update).await,
            Self::Alternate(client) => client.update_profile(update).await,
            Self::Mock(mock) => mock.update_profile(update).await,
            Self::Disabled => Err(disabled()),
        }
    }
}

// --- Hosted (database service auth API) ---

#[derive(Debug, Deserialize)]
struct WireUserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: String,
    #[serde(default)]
    user_metadata: Option<WireUserMetadata>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl WireUser {
    fn into_user(self) -> User {
        let metadata = self.user_metadata.unwrap_or(WireUserMetadata {
            name: None,
            avatar_url: None,
        });
        let name = metadata
            .name
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| name_from_email(&self.email));
        User {
            id: self.id,
            email: self.email,
            name,
            avatar_url: metadata.avatar_url,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    user: WireUser,
}

pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl HostedAuthClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.require_credential("LK_DATABASE_URL")?.to_string();
        let anon_key = config.require_credential("LK_DATABASE_ANON_KEY")?.to_string();
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            session: RwLock::new(None),
        })
    }

    fn session_from(&self, response: TokenResponse) -> Session {
        Session {
            user: response.user.into_user(),
            access_token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        }
    }

    async fn token_request(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(Error::Unauthorized("Invalid email or password".to_string()));
        }
        let response = expect_success(response).await?;
        let token: TokenResponse = response.json().await?;
        let session = self.session_from(token);
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.token_request(
            "/auth/v1/token?grant_type=password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session> {
        self.token_request(
            "/auth/v1/signup",
            serde_json::json!({
                "email": email,
                "password": password,
                "data": { "name": name.unwrap_or(&name_from_email(email)) },
            }),
        )
        .await
    }

    async fn sign_out(&self) -> Result<()> {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            // Best effort: local state is already cleared either way.
            let result = self
                .http
                .post(format!("{}/auth/v1/logout", self.base_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            if let Err(err) = result {
                tracing::debug!("Upstream logout failed: {}", err);
            }
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|session| session.user.clone())
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/v1/recover", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let token = {
            let session = self.session.read().await;
            session
                .as_ref()
                .map(|session| session.access_token.clone())
                .ok_or_else(|| Error::Unauthorized("No active session".to_string()))?
        };
        let response = self
            .http
            .put(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "data": { "name": update.name, "avatar_url": update.avatar_url },
            }))
            .send()
            .await?;
        let response = expect_success(response).await?;
        let wire: WireUser = response.json().await?;
        let user = wire.into_user();
        if let Some(session) = self.session.write().await.as_mut() {
            session.user = user.clone();
        }
        Ok(user)
    }
}

// --- Alternate (standalone identity provider) ---

#[derive(Debug, Deserialize)]
struct AlternateTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AlternateUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

pub struct AlternateAuthClient {
    http: reqwest::Client,
    domain: String,
    client_id: String,
    client_secret: String,
    session: RwLock<Option<Session>>,
}

impl AlternateAuthClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            domain: config.require_credential("LK_AUTH_DOMAIN")?.to_string(),
            client_id: config.require_credential("LK_AUTH_CLIENT_ID")?.to_string(),
            client_secret: config.require_credential("LK_AUTH_CLIENT_SECRET")?.to_string(),
            session: RwLock::new(None),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(format!("https://{}/oauth/token", self.domain))
            .form(&[
                ("grant_type", "password"),
                ("username", email),
                ("password", password),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::FORBIDDEN
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(Error::Unauthorized("Invalid email or password".to_string()));
        }
        let response = expect_success(response).await?;
        let token: AlternateTokenResponse = response.json().await?;

        let info_response = self
            .http
            .get(format!("https://{}/userinfo", self.domain))
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let info_response = expect_success(info_response).await?;
        let info: AlternateUserInfo = info_response.json().await?;

        let session = Session {
            user: User {
                id: info.sub,
                name: info
                    .name
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| name_from_email(&info.email)),
                email: info.email,
                avatar_url: info.picture,
                created_at: Utc::now(),
            },
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session> {
        let response = self
            .http
            .post(format!("https://{}/dbconnections/signup", self.domain))
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "email": email,
                "password": password,
                "name": name.unwrap_or(&name_from_email(email)),
            }))
            .send()
            .await?;
        expect_success(response).await?;
        // The signup endpoint does not return tokens; establish the session
        // with a follow-up credential grant.
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.write().await = None;
        Ok(())
    }

    async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|session| session.user.clone())
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("https://{}/dbconnections/change_password", self.domain))
            .json(&serde_json::json!({ "client_id": self.client_id, "email": email }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn update_profile(&self, _update: ProfileUpdate) -> Result<User> {
        Err(Error::Upstream(
            "Alternate identity provider does not expose profile updates".to_string(),
        ))
    }
}

// --- Mock (in-memory, non-production only) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockClaims {
    sub: String,
    email: String,
    exp: usize,
}

struct StoredUser {
    user: User,
    salt: String,
    password_hash: String,
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, StoredUser>,
    session: Option<User>,
}

pub struct MockAuth {
    state: RwLock<MockState>,
    jwt_secret: String,
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuth {
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            state: RwLock::new(MockState::default()),
            jwt_secret: URL_SAFE_NO_PAD.encode(secret),
        }
    }

    fn hash_password(password: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    fn new_salt() -> String {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        URL_SAFE_NO_PAD.encode(salt)
    }

    fn issue_session(&self, user: User) -> Result<Session> {
        let expires_at = Utc::now() + Duration::seconds(MOCK_TOKEN_TTL_SECONDS);
        let claims = MockClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expires_at.timestamp() as usize,
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|err| Error::Upstream(format!("Failed to issue mock token: {}", err)))?;
        Ok(Session {
            user,
            access_token,
            expires_at,
        })
    }

    /// Sign-in that always succeeds for emails never seen before,
    /// provisioning a user on the fly; explicitly registered users get
    /// their password verified.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state.write().await;
        let user = match state.users.get(email) {
            Some(stored) => {
                if Self::hash_password(password, &stored.salt) != stored.password_hash {
                    return Err(Error::Unauthorized("Invalid email or password".to_string()));
                }
                stored.user.clone()
            }
            None => {
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    email: email.to_string(),
                    name: name_from_email(email),
                    avatar_url: None,
                    created_at: Utc::now(),
                };
                let salt = Self::new_salt();
                state.users.insert(
                    email.to_string(),
                    StoredUser {
                        user: user.clone(),
                        password_hash: Self::hash_password(password, &salt),
                        salt,
                    },
                );
                user
            }
        };
        let session = self.issue_session(user)?;
        state.session = Some(session.user.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session> {
        let mut state = self.state.write().await;
        if state.users.contains_key(email) {
            return Err(Error::InvalidInput(format!(
                "User '{}' is already registered",
                email
            )));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name
                .map(str::to_string)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| name_from_email(email)),
            avatar_url: None,
            created_at: Utc::now(),
        };
        let salt = Self::new_salt();
        state.users.insert(
            email.to_string(),
            StoredUser {
                user: user.clone(),
                password_hash: Self::hash_password(password, &salt),
                salt,
            },
        );
        let session = self.issue_session(user)?;
        state.session = Some(session.user.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.state.write().await.session = None;
        Ok(())
    }

    async fn current_user(&self) -> Option<User> {
        self.state.read().await.session.clone()
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        tracing::debug!("Mock password reset requested for {}", email);
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let mut state = self.state.write().await;
        let mut user = state
            .session
            .clone()
            .ok_or_else(|| Error::Unauthorized("No active session".to_string()))?;
        if let Some(name) = update.name.filter(|value| !value.trim().is_empty()) {
            user.name = name;
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(stored) = state.users.get_mut(&user.email) {
            stored.user = user.clone();
        }
        state.session = Some(user.clone());
        Ok(user)
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::ConfigRegistry;

    fn registry(pairs: &[(&str, &str)]) -> ConfigRegistry {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ConfigRegistry::load(&env)
    }

    #[tokio::test]
    async fn mock_sign_in_always_succeeds_and_defaults_name() {
        let mock = MockAuth::new();
        let session = mock.sign_in("a@b.com", "x").await.unwrap();
        assert_eq!(session.user.name, "a");
        assert_eq!(session.user.email, "a@b.com");

        // sign_in transitioned to Authenticated
        let current = mock.current_user().await.unwrap();
        assert_eq!(current.id, session.user.id);
    }

    #[tokio::test]
    async fn mock_rejects_wrong_password_for_registered_user() {
        let mock = MockAuth::new();
        mock.sign_up("dev@example.com", "secret", Some("Dev User"))
            .await
            .unwrap();
        mock.sign_out().await.unwrap();

        let result = mock.sign_in("dev@example.com", "wrong").await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        // Failed sign-in leaves state unchanged
        assert!(mock.current_user().await.is_none());

        let session = mock.sign_in("dev@example.com", "secret").await.unwrap();
        assert_eq!(session.user.name, "Dev User");
    }

    #[tokio::test]
    async fn mock_sign_out_is_idempotent() {
        let mock = MockAuth::new();
        mock.sign_in("a@b.com", "x").await.unwrap();
        mock.sign_out().await.unwrap();
        assert!(mock.current_user().await.is_none());
        mock.sign_out().await.unwrap();
        assert!(mock.current_user().await.is_none());
    }

    #[tokio::test]
    async fn mock_update_profile_requires_session() {
        let mock = MockAuth::new();
        let result = mock.update_profile(ProfileUpdate::default()).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        mock.sign_in("a@b.com", "x").await.unwrap();
        let user = mock
            .update_profile(ProfileUpdate {
                name: Some("Alice".to_string()),
                avatar_url: None,
            })
            .await
            .unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(mock.current_user().await.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn disabled_operations_return_capability_disabled() {
        let provider = AuthProvider::Disabled;
        assert!(matches!(
            provider.sign_in("a@b.com", "x").await,
            Err(Error::CapabilityDisabled(_))
        ));
        assert!(matches!(
            provider.sign_up("a@b.com", "x", None).await,
            Err(Error::CapabilityDisabled(_))
        ));
        assert!(matches!(
            provider.sign_out().await,
            Err(Error::CapabilityDisabled(_))
        ));
        assert!(matches!(
            provider.current_user().await,
            Err(Error::CapabilityDisabled(_))
        ));
        assert!(matches!(
            provider.reset_password("a@b.com").await,
            Err(Error::CapabilityDisabled(_))
        ));
        assert!(matches!(
            provider.update_profile(ProfileUpdate::default()).await,
            Err(Error::CapabilityDisabled(_))
        ));
    }

    #[test]
    fn selection_prefers_hosted_over_alternate() {
        let registry = registry(&[
            ("LK_ENABLE_AUTH", "true"),
            ("LK_DATABASE_URL", "https://db.example.com"),
            ("LK_DATABASE_ANON_KEY", "anon"),
            ("LK_AUTH_DOMAIN", "id.example.com"),
            ("LK_AUTH_CLIENT_ID", "client"),
            ("LK_AUTH_CLIENT_SECRET", "secret"),
        ]);
        assert_eq!(AuthProvider::select(&registry).kind(), "hosted");
    }

    #[test]
    fn selection_uses_alternate_when_db_unconfigured() {
        let registry = registry(&[
            ("LK_ENABLE_AUTH", "true"),
            ("LK_AUTH_DOMAIN", "id.example.com"),
            ("LK_AUTH_CLIENT_ID", "client"),
            ("LK_AUTH_CLIENT_SECRET", "secret"),
        ]);
        assert_eq!(AuthProvider::select(&registry).kind(), "alternate");
    }

    #[test]
    fn selection_falls_back_to_mock_outside_production() {
        let registry = registry(&[("LK_ENABLE_AUTH", "true")]);
        assert_eq!(AuthProvider::select(&registry).kind(), "mock");
    }

    #[test]
    fn selection_degrades_to_disabled_in_production() {
        let registry = registry(&[("LK_ENABLE_AUTH", "true"), ("LK_ENV", "production")]);
        assert_eq!(AuthProvider::select(&registry).kind(), "disabled");
    }

    #[test]
    fn selection_is_disabled_when_feature_off() {
        let registry = registry(&[
            ("LK_DATABASE_URL", "https://db.example.com"),
            ("LK_DATABASE_ANON_KEY", "anon"),
        ]);
        assert_eq!(AuthProvider::select(&registry).kind(), "disabled");
    }
}
