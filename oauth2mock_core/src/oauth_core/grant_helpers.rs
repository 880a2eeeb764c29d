//! Per-grant resolution of who a token is for and with which scopes.
//!
//! Each flow starts from an authenticated client and ends with an
//! [`IssuanceContext`]; token assembly is shared and lives in the issuer.

use tracing::{instrument, warn};

use super::credentials::Credentials;
use super::error::{OAuthError, Result};
use super::token_issuer::Providers;
use super::types::{AuthorizationRequest, Client, User};

/// Everything token assembly needs once a grant has been accepted.
#[derive(Debug, Clone)]
pub struct IssuanceContext {
    pub client: Client,
    /// Absent for client credentials.
    pub user: Option<User>,
    pub scopes: Vec<String>,
    /// Echoed into the ID token only.
    pub nonce: Option<String>,
}

/// Authorization code exchange.
pub struct AuthorizationCodeFlow<'a> {
    providers: &'a Providers,
}

impl<'a> AuthorizationCodeFlow<'a> {
    pub fn new(providers: &'a Providers) -> Self {
        Self { providers }
    }

    /// Redeems `code` and checks it was issued to `client` for
    /// `redirect_uri`. Every failure is reported as `InvalidGrant`; the
    /// specific cause only goes to the log.
    #[instrument(skip(self, client, code), fields(client_id = %client.id), level = "debug")]
    pub async fn execute(&self, client: Client, code: &str, redirect_uri: Option<&str>) -> Result<IssuanceContext> {
        let Some(request) = self.providers.authorizations.redeem(code).await else {
            warn!(client_id = %client.id, "authorization code unknown, expired or already used");
            return Err(OAuthError::InvalidGrant);
        };
        if request.client_id != client.id {
            warn!(client_id = %client.id, issued_to = %request.client_id, "authorization code client does not match");
            return Err(OAuthError::InvalidGrant);
        }
        if !redirect_matches(&request, &client, redirect_uri) {
            warn!(client_id = %client.id, "authorization code redirect URI does not match");
            return Err(OAuthError::InvalidGrant);
        }
        let Some(user_id) = request.user_id.as_deref() else {
            warn!(client_id = %client.id, "authorization code has no authenticated user");
            return Err(OAuthError::InvalidGrant);
        };
        let user = match self.providers.users.get_user(user_id).await {
            Ok(user) => user,
            Err(err) => {
                warn!(client_id = %client.id, error = %err, "authorization code user no longer exists");
                return Err(OAuthError::InvalidGrant);
            }
        };
        Ok(IssuanceContext {
            client,
            user: Some(user),
            scopes: request.scopes,
            nonce: request.nonce,
        })
    }
}

/// The redirect URI at the token endpoint must repeat the one used at the
/// authorization endpoint. When none was sent there, the registered value
/// stands in for it.
fn redirect_matches(request: &AuthorizationRequest, client: &Client, presented: Option<&str>) -> bool {
    match (request.redirect_uri.as_deref(), presented) {
        (Some(_), None) => false,
        (None, None) => true,
        (_, Some(uri)) => request.effective_redirect_uri(client) == uri,
    }
}

/// Client credentials: the client is its own subject.
pub struct ClientCredentialsFlow;

impl ClientCredentialsFlow {
    pub fn execute(client: Client, scopes: Vec<String>) -> IssuanceContext {
        IssuanceContext { client, user: None, scopes, nonce: None }
    }
}

/// Resource owner password credentials.
pub struct PasswordFlow<'a> {
    providers: &'a Providers,
}

impl<'a> PasswordFlow<'a> {
    pub fn new(providers: &'a Providers) -> Self {
        Self { providers }
    }

    #[instrument(skip(self, client, password, scopes), fields(client_id = %client.id), level = "debug")]
    pub async fn execute(&self, client: Client, username: &str, password: &str, scopes: Vec<String>) -> Result<IssuanceContext> {
        let credentials = Credentials::user_password(username, password)?;
        let user = self.providers.users.authenticate(&credentials).await?;
        Ok(IssuanceContext { client, user: Some(user), scopes, nonce: None })
    }
}
