//! Collaborator traits the token issuer is assembled from.
//!
//! Every seam is an object-safe async trait so providers can be swapped
//! per deployment and replaced by doubles in tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::consent::{Consent, ConsentDecision};
use super::credentials::Credentials;
use super::error::{OAuthError, Result};
use super::types::{AuthorizationRequest, ClaimSet, Client, Purpose, User};

/// Trait for retrieving and authenticating OAuth2 clients.
#[async_trait]
pub trait ClientStore: Send + Sync + 'static {
    /// Retrieves a client by its identifier.
    async fn get_client(&self, id: &str) -> Result<Client>;

    /// Resolves the client named by `credentials` and checks its secret.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Client>;
}

/// Trait for the resource owner directory.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get_user(&self, id: &str) -> Result<User>;

    /// Resolves the user named by `credentials` and checks the password.
    async fn authenticate(&self, credentials: &Credentials) -> Result<User>;
}

/// Pending authorization requests keyed by single-use codes.
#[async_trait]
pub trait AuthorizationStore: Send + Sync + 'static {
    /// Stores `request` under a fresh code and returns the code.
    async fn store(&self, request: AuthorizationRequest) -> Result<String>;

    /// Removes and returns the request stored under `code`. Absent and
    /// expired codes both yield `None`.
    async fn redeem(&self, code: &str) -> Option<AuthorizationRequest>;

    /// Drops `code` if present.
    async fn revoke(&self, code: &str);
}

/// Per (user, client, scope) consent records.
#[async_trait]
pub trait ConsentStore: Send + Sync + 'static {
    /// Current record for every requested scope.
    async fn get_consents(&self, user_id: &str, client_id: &str, scopes: &[String]) -> Result<HashMap<String, Consent>>;

    async fn save_consents(&self, user_id: &str, client_id: &str, decisions: &[ConsentDecision]) -> Result<()>;

    async fn clear_consents(&self, user_id: &str, client_id: &str) -> Result<()>;

    /// Returns the requested scopes whose consent is usable right now, in
    /// request order, consuming any one-time grants among them. Fails
    /// without consuming anything if a scope is undefined.
    async fn redeem_consents(&self, user_id: &str, client_id: &str, scopes: &[String]) -> Result<Vec<String>>;
}

/// Builds claim sets for users and clients.
#[async_trait]
pub trait ClaimsResolver: Send + Sync + 'static {
    /// Resolves user claims for several purposes from a single consent
    /// evaluation.
    async fn user_claims_for(
        &self,
        user: &User,
        client: &Client,
        scopes: &[String],
        purposes: &[Purpose],
    ) -> Result<BTreeMap<Purpose, ClaimSet>>;

    async fn client_claims(&self, client: &Client, scopes: &[String], purpose: Purpose) -> Result<ClaimSet>;

    async fn user_claims(&self, user: &User, client: &Client, scopes: &[String], purpose: Purpose) -> Result<ClaimSet> {
        self.user_claims_for(user, client, scopes, &[purpose])
            .await?
            .remove(&purpose)
            .ok_or_else(|| OAuthError::Internal(format!("no claim set resolved for {purpose:?}")))
    }
}

/// External signing backend. Tokens are opaque to the engine.
#[async_trait]
pub trait Signer: Send + Sync + 'static {
    async fn sign(&self, claims: &ClaimSet) -> Result<String>;

    /// Public keys as a serialized JWKS document.
    fn jwks(&self) -> Result<Vec<u8>>;

    /// JWS algorithm names this signer may produce.
    fn signing_methods(&self) -> Vec<String>;
}
