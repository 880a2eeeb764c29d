//! Layered claims resolution.
//!
//! Each subject carries a default layer and optional per-purpose layers.
//! A layer is applied as base, then the override for the requesting
//! client, then one override per scope in request order. The purpose layer
//! is applied after the default one, so it wins on collisions. For users
//! only scopes with usable consent contribute overrides.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::error::{OAuthError, Result};
use super::oauth_provider::{ClaimsResolver, ConsentStore};
use super::types::{join_scopes, ClaimSet, Client, Purpose, User};

/// One layer of claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimLayer {
    #[serde(default)]
    pub base: ClaimSet,
    /// Keyed by client id.
    #[serde(default)]
    pub client_overrides: HashMap<String, ClaimSet>,
    /// Keyed by scope name.
    #[serde(default)]
    pub scope_overrides: HashMap<String, ClaimSet>,
}

impl ClaimLayer {
    fn apply<'a>(&self, claims: &mut ClaimSet, client_id: &str, scopes: impl IntoIterator<Item = &'a String>) {
        merge(claims, &self.base);
        if let Some(over) = self.client_overrides.get(client_id) {
            merge(claims, over);
        }
        for scope in scopes {
            if let Some(over) = self.scope_overrides.get(scope) {
                merge(claims, over);
            }
        }
    }
}

/// All claim layers of one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectClaims {
    #[serde(default)]
    pub default: ClaimLayer,
    #[serde(default)]
    pub by_purpose: HashMap<Purpose, ClaimLayer>,
}

impl SubjectClaims {
    /// Claims with only a default base layer.
    pub fn with_base(base: ClaimSet) -> Self {
        Self { default: ClaimLayer { base, ..Default::default() }, ..Default::default() }
    }

    fn resolve(&self, client_id: &str, scopes: &[String], purpose: Purpose) -> ClaimSet {
        let mut claims = ClaimSet::new();
        self.default.apply(&mut claims, client_id, scopes);
        if let Some(layer) = self.by_purpose.get(&purpose) {
            layer.apply(&mut claims, client_id, scopes);
        }
        claims
    }
}

fn merge(into: &mut ClaimSet, layer: &ClaimSet) {
    for (k, v) in layer {
        into.insert(k.clone(), v.clone());
    }
}

#[derive(Debug, Default)]
struct ClaimTables {
    users: HashMap<String, SubjectClaims>,
    clients: HashMap<String, SubjectClaims>,
}

/// Claims resolver over in-memory tables, gated by a [`ConsentStore`].
#[derive(Clone)]
pub struct InMemoryClaimsResolver {
    tables: Arc<RwLock<ClaimTables>>,
    consents: Arc<dyn ConsentStore>,
}

impl InMemoryClaimsResolver {
    pub fn new(
        users: HashMap<String, SubjectClaims>,
        clients: HashMap<String, SubjectClaims>,
        consents: Arc<dyn ConsentStore>,
    ) -> Self {
        Self { tables: Arc::new(RwLock::new(ClaimTables { users, clients })), consents }
    }

    /// Replaces both tables at once; readers see either the old or the new
    /// tables, never a mix.
    pub async fn reload(&self, users: HashMap<String, SubjectClaims>, clients: HashMap<String, SubjectClaims>) {
        self.reload_with(users, clients, async {}).await;
    }

    /// Like [`reload`](Self::reload), but also runs `alongside` while the
    /// tables are write-locked. User claims resolution holds the tables
    /// for its whole consent lookup, so a consent swap done here is never
    /// observed next to the old tables.
    pub async fn reload_with<F>(
        &self,
        users: HashMap<String, SubjectClaims>,
        clients: HashMap<String, SubjectClaims>,
        alongside: F,
    ) where
        F: Future<Output = ()>,
    {
        let fresh = ClaimTables { users, clients };
        let (u, c) = (fresh.users.len(), fresh.clients.len());
        let mut tables = self.tables.write().await;
        alongside.await;
        *tables = fresh;
        debug!(users = u, clients = c, "claims tables reloaded");
    }
}

#[async_trait]
impl ClaimsResolver for InMemoryClaimsResolver {
    #[instrument(skip(self, user, client), fields(user_id = %user.id, client_id = %client.id), level = "debug")]
    async fn user_claims_for(
        &self,
        user: &User,
        client: &Client,
        scopes: &[String],
        purposes: &[Purpose],
    ) -> Result<BTreeMap<Purpose, ClaimSet>> {
        let tables = self.tables.read().await;
        // looked up first so a missing record consumes no consent
        let record = tables
            .users
            .get(&user.id)
            .ok_or_else(|| OAuthError::NoClaimsForSubject(user.id.clone()))?;
        let granted = self.consents.redeem_consents(&user.id, &client.id, scopes).await?;
        let scope_claim = Value::String(join_scopes(&granted));

        Ok(purposes
            .iter()
            .map(|purpose| {
                let mut claims = record.resolve(&client.id, &granted, *purpose);
                claims.insert("scope".to_owned(), scope_claim.clone());
                (*purpose, claims)
            })
            .collect())
    }

    #[instrument(skip(self, client), fields(client_id = %client.id), level = "debug")]
    async fn client_claims(&self, client: &Client, scopes: &[String], purpose: Purpose) -> Result<ClaimSet> {
        let tables = self.tables.read().await;
        let record = tables
            .clients
            .get(&client.id)
            .ok_or_else(|| OAuthError::NoClaimsForSubject(client.id.clone()))?;
        Ok(record.resolve(&client.id, scopes, purpose))
    }
}
