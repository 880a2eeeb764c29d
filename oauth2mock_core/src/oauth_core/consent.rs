//! Consent engine: scope policy plus per (user, client) decisions.
//!
//! Decisions recorded for a (user, client) pair take precedence over the
//! user's configured standing consents, which take precedence over the
//! undecided default. Expiry of time-boxed grants is evaluated at read time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::clock::{Clock, SystemClock};
use super::error::{OAuthError, Result};
use super::oauth_provider::ConsentStore;

/// How long a grant stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    /// Until revoked.
    Persistent,
    /// For exactly one claims resolution.
    OneTime,
    /// For the given span after the grant was recorded.
    Duration(Duration),
    /// Until the given instant.
    Until(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsentState {
    Undecided,
    Granted { kind: GrantKind, granted_at: DateTime<Utc> },
    Revoked,
}

/// Consent record for one scope, as seen by one (user, client) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    scope: String,
    required: bool,
    state: ConsentState,
}

impl Consent {
    fn new(scope: &str, required: bool, state: ConsentState) -> Self {
        Self { scope: scope.to_owned(), required, state }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self.state, ConsentState::Revoked)
    }

    pub fn grant_kind(&self) -> Option<GrantKind> {
        match self.state {
            ConsentState::Granted { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// End of the usable window for time-boxed grants.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            ConsentState::Granted { kind: GrantKind::Duration(d), granted_at } => Some(granted_at + d),
            ConsentState::Granted { kind: GrantKind::Until(t), .. } => Some(t),
            _ => None,
        }
    }

    /// Whether a grant is on record and its window still covers `now`.
    pub fn is_granted(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            ConsentState::Granted { .. } => self.expires_at().is_none_or(|end| now < end),
            _ => false,
        }
    }

    /// Whether claims for this scope may be released at `now`. Scopes that
    /// do not require consent are usable unless explicitly revoked.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        if self.is_revoked() {
            return false;
        }
        !self.required || self.is_granted(now)
    }
}

/// A grant or revoke action for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDecision {
    pub scope: String,
    pub grant: Option<GrantKind>,
}

impl ConsentDecision {
    pub fn grant(scope: impl Into<String>, kind: GrantKind) -> Self {
        Self { scope: scope.into(), grant: Some(kind) }
    }

    pub fn revoke(scope: impl Into<String>) -> Self {
        Self { scope: scope.into(), grant: None }
    }
}

/// Policy entry for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopePolicy {
    #[serde(rename = "requireConsent", default = "require_consent_default")]
    pub require_consent: bool,
}

fn require_consent_default() -> bool {
    true
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self { require_consent: true }
    }
}

type PairKey = (String, String);

/// Decisions recorded for one (user, client) pair.
#[derive(Debug, Default)]
struct PairDecisions {
    /// Set by a clear; standing consents no longer apply to the pair.
    masks_standing: bool,
    states: HashMap<String, ConsentState>,
}

/// Consent store holding everything in memory.
#[derive(Clone)]
pub struct InMemoryConsentStore {
    policy: Arc<RwLock<HashMap<String, ScopePolicy>>>,
    /// Standing consents per user, applied to every client.
    standing: Arc<RwLock<HashMap<String, HashMap<String, bool>>>>,
    decisions: Arc<RwLock<HashMap<PairKey, PairDecisions>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryConsentStore {
    /// Creates a store for the given scope policy.
    pub fn new(policy: HashMap<String, ScopePolicy>) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: HashMap<String, ScopePolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: Arc::new(RwLock::new(policy)),
            standing: Arc::new(RwLock::new(HashMap::new())),
            decisions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Replaces the standing consents of all users.
    pub async fn set_standing_consents(&self, standing: HashMap<String, HashMap<String, bool>>) {
        *self.standing.write().await = standing;
    }

    /// Swaps in a new scope policy. Recorded decisions are kept.
    pub async fn reload_policy(&self, policy: HashMap<String, ScopePolicy>) {
        let count = policy.len();
        *self.policy.write().await = policy;
        debug!(scopes = count, "consent policy reloaded");
    }

    /// Swaps policy and standing consents together. Readers take the
    /// policy lock first, so none sees one without the other.
    pub async fn reload(&self, policy: HashMap<String, ScopePolicy>, standing: HashMap<String, HashMap<String, bool>>) {
        let count = policy.len();
        let mut current_policy = self.policy.write().await;
        let mut current_standing = self.standing.write().await;
        *current_policy = policy;
        *current_standing = standing;
        debug!(scopes = count, "consent policy and standing consents reloaded");
    }

    fn check_defined(policy: &HashMap<String, ScopePolicy>, scopes: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
        for scope in scopes {
            let scope = scope.as_ref();
            if !policy.contains_key(scope) {
                return Err(OAuthError::UndefinedScope(scope.to_owned()));
            }
        }
        Ok(())
    }

    fn resolve(
        scope: &str,
        policy: &ScopePolicy,
        pair: Option<&PairDecisions>,
        standing: Option<&HashMap<String, bool>>,
    ) -> Consent {
        let standing = if pair.is_some_and(|p| p.masks_standing) { None } else { standing };
        let state = pair
            .and_then(|p| p.states.get(scope).copied())
            .or_else(|| {
                standing.and_then(|s| s.get(scope)).map(|granted| {
                    if *granted {
                        ConsentState::Granted { kind: GrantKind::Persistent, granted_at: DateTime::<Utc>::MIN_UTC }
                    } else {
                        ConsentState::Revoked
                    }
                })
            })
            .unwrap_or(ConsentState::Undecided);
        Consent::new(scope, policy.require_consent, state)
    }
}

fn pair_key(user_id: &str, client_id: &str) -> PairKey {
    (user_id.to_owned(), client_id.to_owned())
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn get_consents(&self, user_id: &str, client_id: &str, scopes: &[String]) -> Result<HashMap<String, Consent>> {
        let policy = self.policy.read().await;
        Self::check_defined(&policy, scopes)?;
        let standing = self.standing.read().await;
        let decisions = self.decisions.read().await;
        let pair = decisions.get(&pair_key(user_id, client_id));
        let user_standing = standing.get(user_id);

        Ok(scopes
            .iter()
            .filter_map(|scope| {
                policy
                    .get(scope)
                    .map(|p| (scope.clone(), Self::resolve(scope, p, pair, user_standing)))
            })
            .collect())
    }

    #[instrument(skip(self, decisions), fields(count = decisions.len()), level = "debug")]
    async fn save_consents(&self, user_id: &str, client_id: &str, decisions: &[ConsentDecision]) -> Result<()> {
        let policy = self.policy.read().await;
        Self::check_defined(&policy, decisions.iter().map(|d| d.scope.as_str()))?;
        let now = self.clock.now();
        let mut all = self.decisions.write().await;
        let pair = all.entry(pair_key(user_id, client_id)).or_default();
        for decision in decisions {
            let state = match decision.grant {
                Some(kind) => ConsentState::Granted { kind, granted_at: now },
                None => ConsentState::Revoked,
            };
            pair.states.insert(decision.scope.clone(), state);
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear_consents(&self, user_id: &str, client_id: &str) -> Result<()> {
        let mut all = self.decisions.write().await;
        all.insert(pair_key(user_id, client_id), PairDecisions { masks_standing: true, states: HashMap::new() });
        Ok(())
    }

    async fn redeem_consents(&self, user_id: &str, client_id: &str, scopes: &[String]) -> Result<Vec<String>> {
        let policy = self.policy.read().await;
        Self::check_defined(&policy, scopes)?;
        let standing = self.standing.read().await;
        let now = self.clock.now();
        let key = pair_key(user_id, client_id);

        let mut all = self.decisions.write().await;
        let mut usable = Vec::with_capacity(scopes.len());
        let mut consumed = Vec::new();
        for scope in scopes {
            let Some(scope_policy) = policy.get(scope) else { continue };
            let consent = Self::resolve(scope, scope_policy, all.get(&key), standing.get(user_id));
            if !consent.is_usable(now) {
                continue;
            }
            if consent.grant_kind() == Some(GrantKind::OneTime) && consent.is_granted(now) {
                consumed.push(scope.clone());
            }
            usable.push(scope.clone());
        }
        if !consumed.is_empty() {
            let pair = all.entry(key).or_default();
            for scope in &consumed {
                pair.states.insert(scope.clone(), ConsentState::Undecided);
            }
            debug!(user_id, client_id, scopes = ?consumed, "one-time consents consumed");
        }
        Ok(usable)
    }
}
