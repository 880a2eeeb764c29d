//! In-memory default implementations for the provider traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use oauth2mock_lib::random_code;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::credentials::Credentials;
use super::error::{OAuthError, Result};
use super::oauth_provider::{AuthorizationStore, ClientStore, UserStore};
use super::types::{AuthorizationRequest, Client, User};

#[derive(Clone)]
pub struct InMemoryClientStore {
    clients: Arc<DashMap<String, Client>>,
}

impl InMemoryClientStore {
    /// Creates a new in-memory client store with an initial set of clients.
    pub fn new(initial_clients: Vec<Client>) -> Self {
        let map = DashMap::new();
        for client in initial_clients {
            map.insert(client.id.clone(), client);
        }
        Self { clients: Arc::new(map) }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get_client(&self, id: &str) -> Result<Client> {
        self.clients
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OAuthError::ClientNotFound(id.to_owned()))
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Client> {
        let client_id = match credentials {
            Credentials::ClientSecret { client_id, .. } => client_id,
            Credentials::ClientAssertion { .. } => {
                return Err(OAuthError::Unsupported("client assertion authentication".into()));
            }
            Credentials::UserPassword { .. } => return Err(OAuthError::InvalidClient),
        };
        let Some(client) = self.clients.get(client_id).map(|e| e.value().clone()) else {
            warn!(client_id = %client_id, "authentication for unknown client");
            return Err(OAuthError::InvalidClient);
        };
        client.scheme.authenticate(credentials)?;
        Ok(client)
    }
}

/// User directory indexed by id and by login name.
#[derive(Clone)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<String, User>>,
    by_username: Arc<DashMap<String, String>>,
}

impl InMemoryUserStore {
    pub fn new(initial_users: Vec<User>) -> Self {
        let users = DashMap::new();
        let by_username = DashMap::new();
        for user in initial_users {
            by_username.insert(user.username.clone(), user.id.clone());
            users.insert(user.id.clone(), user);
        }
        Self { users: Arc::new(users), by_username: Arc::new(by_username) }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, id: &str) -> Result<User> {
        self.users
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OAuthError::UserNotFound(id.to_owned()))
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<User> {
        let Credentials::UserPassword { username, .. } = credentials else {
            return Err(OAuthError::InvalidCredentials);
        };
        let user = self
            .by_username
            .get(username)
            .and_then(|id| self.users.get(id.value()).map(|u| u.value().clone()));
        let Some(user) = user else {
            warn!(username = %username, "authentication for unknown user");
            return Err(OAuthError::InvalidCredentials);
        };
        user.scheme.authenticate(credentials)?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
struct CodeEntry {
    request: AuthorizationRequest,
    expires_at: DateTime<Utc>,
}

const MAX_CODE_ATTEMPTS: usize = 4;

/// Authorization request store with TTL expiry and single redemption.
///
/// One lock guards the code map. Store, redeem, revoke and sweep all take
/// it for writing, so a redeemed or swept code is gone for every later
/// reader.
#[derive(Clone)]
pub struct InMemoryAuthorizationStore {
    codes: Arc<RwLock<HashMap<String, CodeEntry>>>,
    ttl: Duration,
    code_length: usize,
    clock: Arc<dyn Clock>,
    last_sweep_ms: Arc<AtomicI64>,
}

impl InMemoryAuthorizationStore {
    /// Creates a store whose codes live for `ttl` and carry `code_length`
    /// bytes of entropy.
    pub fn new(ttl: Duration, code_length: usize) -> Self {
        Self::with_clock(ttl, code_length, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, code_length: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            code_length,
            clock,
            last_sweep_ms: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }

    /// Deletes every entry whose TTL has elapsed and returns how many went.
    ///
    /// A cycle is skipped when the clock reads earlier than at the previous
    /// sweep. The earlier reading becomes the new reference, so the next
    /// cycle runs normally.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let previous = self.last_sweep_ms.swap(now_ms, Ordering::AcqRel);
        if now_ms < previous {
            warn!(previous_ms = previous, now_ms, "clock moved backwards, skipping code sweep");
            return 0;
        }

        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, entry| entry.expires_at >= now);
        let removed = before - codes.len();
        if removed > 0 {
            debug!(removed, remaining = codes.len(), "expired authorization codes swept");
        }
        removed
    }

    /// Spawns the periodic sweep. The task runs until the returned handle
    /// is shut down or dropped.
    pub fn start_sweeper(&self, interval: StdDuration) -> Sweeper {
        let store = self.clone();
        let (tx, mut rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep().await;
                    }
                    _ = &mut rx => break,
                }
            }
            debug!("authorization code sweeper stopped");
        });
        info!(interval_secs = interval.as_secs(), "authorization code sweeper started");
        Sweeper { shutdown: Some(tx), handle: Some(handle) }
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    #[instrument(skip(self, request), fields(client_id = %request.client_id), level = "debug")]
    async fn store(&self, request: AuthorizationRequest) -> Result<String> {
        let expires_at = self.clock.now() + self.ttl;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = random_code(self.code_length)?;
            let mut codes = self.codes.write().await;
            if codes.contains_key(&code) {
                warn!("authorization code collision, regenerating");
                continue;
            }
            codes.insert(code.clone(), CodeEntry { request, expires_at });
            return Ok(code);
        }
        Err(OAuthError::Internal("could not generate a unique authorization code".into()))
    }

    async fn redeem(&self, code: &str) -> Option<AuthorizationRequest> {
        let now = self.clock.now();
        let entry = self.codes.write().await.remove(code)?;
        if now > entry.expires_at {
            debug!("expired authorization code presented");
            return None;
        }
        Some(entry.request)
    }

    async fn revoke(&self, code: &str) {
        self.codes.write().await.remove(code);
    }
}

/// Handle to a running sweep task.
pub struct Sweeper {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Signals the task to stop and waits for it.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "authorization code sweeper ended abnormally");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
