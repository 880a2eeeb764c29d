//! Parsed configuration documents and the registries built from them.
//!
//! The JSON shape follows the data file the mock server is usually started
//! with: `clients`, `users.users`, `scopes` and an optional `settings`
//! block. Plaintext secrets only live in the parsed document; the built
//! [`Client`] and [`User`] values hold PBKDF2 hashes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use oauth2mock_lib::WildcardPattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracing::info;

use super::claims::{InMemoryClaimsResolver, SubjectClaims};
use super::clock::Clock;
use super::consent::{InMemoryConsentStore, ScopePolicy};
use super::credentials::{AuthenticationScheme, SchemeKind};
use super::error::{OAuthError, Result};
use super::memory::{InMemoryAuthorizationStore, InMemoryClientStore, InMemoryUserStore};
use super::oauth_provider::Signer;
use super::token_issuer::Providers;
use super::types::{ClaimSet, Client, User};

/// Issuer-wide knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    pub issuer: String,
    /// Lifetime of access, refresh and ID tokens.
    pub token_ttl_secs: u64,
    pub authorization_code_ttl_secs: u64,
    /// Bytes of entropy per authorization code.
    pub authorization_code_length: usize,
    pub sweep_interval_secs: u64,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_owned(),
            token_ttl_secs: 3600,
            authorization_code_ttl_secs: 60,
            authorization_code_length: 32,
            sweep_interval_secs: 600,
        }
    }
}

impl IssuerSettings {
    pub fn with_issuer(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into(), ..Default::default() }
    }

    pub fn token_ttl(&self) -> Duration {
        ttl_duration(self.token_ttl_secs)
    }

    pub fn authorization_code_ttl(&self) -> Duration {
        ttl_duration(self.authorization_code_ttl_secs)
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(OAuthError::Config("issuer must not be empty".into()));
        }
        if self.token_ttl_secs == 0 || self.authorization_code_ttl_secs == 0 {
            return Err(OAuthError::Config("token and code lifetimes must be > 0".into()));
        }
        if self.token_ttl_secs > MAX_TTL_SECS || self.authorization_code_ttl_secs > MAX_TTL_SECS {
            return Err(OAuthError::Config(format!("token and code lifetimes must not exceed {MAX_TTL_SECS} seconds")));
        }
        if self.authorization_code_length < 16 {
            return Err(OAuthError::Config("authorization_code_length must be at least 16 bytes".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(OAuthError::Config("sweep_interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Longest accepted token or code lifetime, ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// clamped so settings built without `validate` still yield a usable expiry
fn ttl_duration(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientEntry {
    /// Defaults to the registry key.
    #[serde(default)]
    pub client_id: Option<String>,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub claims: Option<SubjectClaims>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, ClaimSet>,
    /// Standing `{scope: granted}` decisions applied to every client.
    #[serde(default)]
    pub consents: HashMap<String, bool>,
    #[serde(default)]
    pub claims: Option<SubjectClaims>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersSection {
    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,
}

/// Scope policy: either `{name: {requireConsent}}` or a bare list of names,
/// each requiring consent.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScopesSection {
    Policies(HashMap<String, ScopePolicy>),
    Names(Vec<String>),
}

impl Default for ScopesSection {
    fn default() -> Self {
        ScopesSection::Names(Vec::new())
    }
}

/// Whole configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub settings: IssuerSettings,
    #[serde(default)]
    pub scopes: ScopesSection,
    #[serde(default)]
    pub clients: BTreeMap<String, ClientEntry>,
    #[serde(default)]
    pub users: UsersSection,
}

impl ConfigDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(raw)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let doc: Self = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        let mut usernames = HashSet::new();
        for (key, user) in &self.users.users {
            if user.username.is_empty() {
                return Err(OAuthError::Config(format!("user {key} has an empty username")));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(OAuthError::Config(format!("duplicate username {}", user.username)));
            }
        }
        for (key, client) in &self.clients {
            if client.client_id.as_deref().unwrap_or(key).is_empty() {
                return Err(OAuthError::Config(format!("client {key} has an empty client_id")));
            }
        }
        Ok(())
    }

    fn client_id<'a>(key: &'a str, entry: &'a ClientEntry) -> &'a str {
        entry.client_id.as_deref().unwrap_or(key)
    }

    pub fn scope_policy(&self) -> HashMap<String, ScopePolicy> {
        match &self.scopes {
            ScopesSection::Policies(map) => map.clone(),
            ScopesSection::Names(names) => names.iter().map(|n| (n.clone(), ScopePolicy::default())).collect(),
        }
    }

    /// Hashes every client secret.
    pub fn build_clients(&self) -> Result<Vec<Client>> {
        self.clients
            .iter()
            .map(|(key, entry)| -> Result<Client> {
                let id = Self::client_id(key, entry);
                let redirect_uri = WildcardPattern::new(&entry.redirect_uri)
                    .map_err(|e| OAuthError::Config(format!("client {id}: {e}")))?;
                Ok(Client {
                    id: id.to_owned(),
                    redirect_uri,
                    scheme: AuthenticationScheme::new(SchemeKind::ClientSecret, id, &entry.client_secret)?,
                })
            })
            .collect()
    }

    /// Hashes every password. The registry key becomes the user id.
    pub fn build_users(&self) -> Result<Vec<User>> {
        self.users
            .users
            .iter()
            .map(|(id, entry)| -> Result<User> {
                Ok(User {
                    id: id.clone(),
                    username: entry.username.clone(),
                    scheme: AuthenticationScheme::new(SchemeKind::UserPassword, &entry.username, &entry.password)?,
                    attributes: entry.attributes.clone(),
                })
            })
            .collect()
    }

    /// Standing consents keyed by user id.
    pub fn standing_consents(&self) -> HashMap<String, HashMap<String, bool>> {
        self.users
            .users
            .iter()
            .filter(|(_, u)| !u.consents.is_empty())
            .map(|(id, u)| (id.clone(), u.consents.clone()))
            .collect()
    }

    /// Claims record for every configured user. Attribute groups are merged
    /// underneath the default base layer, in group name order.
    pub fn user_claims(&self) -> HashMap<String, SubjectClaims> {
        self.users
            .users
            .iter()
            .map(|(id, entry)| {
                let mut claims = entry.claims.clone().unwrap_or_default();
                let mut base = ClaimSet::new();
                for group in entry.attributes.values() {
                    base.extend(group.clone());
                }
                base.extend(std::mem::take(&mut claims.default.base));
                claims.default.base = base;
                (id.clone(), claims)
            })
            .collect()
    }

    /// Claims record for every configured client, keyed by client id.
    pub fn client_claims(&self) -> HashMap<String, SubjectClaims> {
        self.clients
            .iter()
            .map(|(key, entry)| (Self::client_id(key, entry).to_owned(), entry.claims.clone().unwrap_or_default()))
            .collect()
    }
}

/// The in-memory providers built from one configuration document.
#[derive(Clone)]
pub struct InMemoryProviders {
    pub clients: InMemoryClientStore,
    pub users: InMemoryUserStore,
    pub authorizations: InMemoryAuthorizationStore,
    pub consents: InMemoryConsentStore,
    pub claims: InMemoryClaimsResolver,
    pub clock: Arc<dyn Clock>,
}

impl InMemoryProviders {
    pub async fn from_document(doc: &ConfigDocument, clock: Arc<dyn Clock>) -> Result<Self> {
        let clients = InMemoryClientStore::new(doc.build_clients()?);
        let users = InMemoryUserStore::new(doc.build_users()?);
        let authorizations = InMemoryAuthorizationStore::with_clock(
            doc.settings.authorization_code_ttl(),
            doc.settings.authorization_code_length,
            clock.clone(),
        );
        let consents = InMemoryConsentStore::with_clock(doc.scope_policy(), clock.clone());
        consents.set_standing_consents(doc.standing_consents()).await;
        let claims = InMemoryClaimsResolver::new(doc.user_claims(), doc.client_claims(), Arc::new(consents.clone()));
        info!(clients = clients.len(), users = doc.users.users.len(), "providers built from configuration");
        Ok(Self { clients, users, authorizations, consents, claims, clock })
    }

    /// Wires the stores together with `signer`.
    pub fn providers(&self, signer: Arc<dyn Signer>) -> Providers {
        Providers {
            clients: Arc::new(self.clients.clone()),
            users: Arc::new(self.users.clone()),
            authorizations: Arc::new(self.authorizations.clone()),
            consents: Arc::new(self.consents.clone()),
            claims: Arc::new(self.claims.clone()),
            signer,
            clock: self.clock.clone(),
        }
    }

    /// Swaps in the scope policy, standing consents and claim tables of
    /// `doc` as one step. Clients, users and pending codes are left alone.
    pub async fn reload(&self, doc: &ConfigDocument) {
        let consents = self.consents.reload(doc.scope_policy(), doc.standing_consents());
        self.claims.reload_with(doc.user_claims(), doc.client_claims(), consents).await;
    }
}
