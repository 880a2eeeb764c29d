//! Token issuance: the use-case layer the HTTP handlers call into.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::clock::Clock;
use super::config::IssuerSettings;
use super::consent::{Consent, ConsentDecision};
use super::credentials::Credentials;
use super::error::{OAuthError, Result};
use super::grant_helpers::{AuthorizationCodeFlow, ClientCredentialsFlow, IssuanceContext, PasswordFlow};
use super::oauth_provider::{AuthorizationStore, ClaimsResolver, ClientStore, ConsentStore, Signer, UserStore};
use super::types::{join_scopes, AuthorizationRequest, ClaimSet, Grant, Purpose, TokenRequest, TokenResponse};

/// Claims the issuer always sets itself; resolved claims cannot replace them.
pub const RESERVED_CLAIMS: [&str; 6] = ["iss", "sub", "azp", "iat", "exp", "typ"];

const TOKEN_PURPOSES: [Purpose; 3] = [Purpose::Access, Purpose::Refresh, Purpose::Id];

/// The collaborators a [`TokenIssuer`] is built from.
#[derive(Clone)]
pub struct Providers {
    pub clients: Arc<dyn ClientStore>,
    pub users: Arc<dyn UserStore>,
    pub authorizations: Arc<dyn AuthorizationStore>,
    pub consents: Arc<dyn ConsentStore>,
    pub claims: Arc<dyn ClaimsResolver>,
    pub signer: Arc<dyn Signer>,
    pub clock: Arc<dyn Clock>,
}

/// Coordinates authentication, grant resolution, claims and signing.
#[derive(Clone)]
pub struct TokenIssuer {
    providers: Providers,
    settings: IssuerSettings,
}

impl TokenIssuer {
    pub fn new(providers: Providers, settings: IssuerSettings) -> Self {
        Self { providers, settings }
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    /// Validates an authorization request for an authenticated user and
    /// stores it, returning the code to send back to the client.
    #[instrument(skip(self, request), fields(client_id = %request.client_id), level = "debug")]
    pub async fn authorize(&self, request: AuthorizationRequest) -> Result<String> {
        let client = self.providers.clients.get_client(&request.client_id).await?;
        request.validate(&client)?;
        let Some(user_id) = request.user_id.as_deref() else {
            return Err(OAuthError::InvalidRequest("user is not authenticated".into()));
        };
        self.providers.users.get_user(user_id).await?;
        self.providers.authorizations.store(request).await
    }

    /// Takes a stored authorization request out of the store.
    pub async fn redeem_authorization(&self, code: &str) -> Option<AuthorizationRequest> {
        self.providers.authorizations.redeem(code).await
    }

    pub async fn revoke_authorization(&self, code: &str) {
        self.providers.authorizations.revoke(code).await
    }

    /// Handles a token endpoint request for any supported grant.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, grant_type = %request.grant.grant_type()), level = "debug")]
    pub async fn issue(&self, request: TokenRequest) -> Result<TokenResponse> {
        let credentials = Credentials::client_secret(&request.client_id, request.client_secret)?;
        let client = self.providers.clients.authenticate(&credentials).await?;

        let context = match request.grant {
            Grant::AuthorizationCode { code, redirect_uri } => {
                AuthorizationCodeFlow::new(&self.providers)
                    .execute(client, &code, redirect_uri.as_deref())
                    .await?
            }
            Grant::ClientCredentials { scopes } => ClientCredentialsFlow::execute(client, scopes),
            Grant::Password { username, password, scopes } => {
                PasswordFlow::new(&self.providers)
                    .execute(client, &username, &password, scopes)
                    .await?
            }
        };
        let response = self.assemble(context).await?;
        info!(client_id = %request.client_id, "token issued");
        Ok(response)
    }

    /// Claims for the userinfo endpoint. A subject equal to the client id
    /// with no matching user resolves client claims instead.
    #[instrument(skip(self), level = "debug")]
    pub async fn userinfo(&self, subject: &str, client_id: &str, scopes: &[String]) -> Result<ClaimSet> {
        let client = self.providers.clients.get_client(client_id).await?;
        let mut claims = match self.providers.users.get_user(subject).await {
            Ok(user) => self.providers.claims.user_claims(&user, &client, scopes, Purpose::UserInfo).await?,
            Err(OAuthError::UserNotFound(_)) if subject == client.id => {
                self.providers.claims.client_claims(&client, scopes, Purpose::UserInfo).await?
            }
            Err(err) => return Err(err),
        };
        claims.insert("sub".to_owned(), Value::String(subject.to_owned()));
        Ok(claims)
    }

    pub async fn get_consents(&self, user_id: &str, client_id: &str, scopes: &[String]) -> Result<HashMap<String, Consent>> {
        self.providers.consents.get_consents(user_id, client_id, scopes).await
    }

    pub async fn save_consents(&self, user_id: &str, client_id: &str, decisions: &[ConsentDecision]) -> Result<()> {
        self.providers.consents.save_consents(user_id, client_id, decisions).await
    }

    pub async fn clear_consents(&self, user_id: &str, client_id: &str) -> Result<()> {
        self.providers.consents.clear_consents(user_id, client_id).await
    }

    async fn resolve_claims(&self, context: &IssuanceContext) -> Result<BTreeMap<Purpose, ClaimSet>> {
        let claims = &self.providers.claims;
        match &context.user {
            Some(user) => claims.user_claims_for(user, &context.client, &context.scopes, &TOKEN_PURPOSES).await,
            None => {
                let mut sets = BTreeMap::new();
                for purpose in TOKEN_PURPOSES {
                    sets.insert(purpose, claims.client_claims(&context.client, &context.scopes, purpose).await?);
                }
                Ok(sets)
            }
        }
    }

    async fn assemble(&self, context: IssuanceContext) -> Result<TokenResponse> {
        let mut resolved = self.resolve_claims(&context).await?;
        let scope = match &context.user {
            Some(_) => resolved
                .get(&Purpose::Access)
                .and_then(|c| c.get("scope"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            None => Some(join_scopes(&context.scopes)),
        }
        .filter(|s| !s.is_empty());

        let mut tokens = BTreeMap::new();
        for purpose in TOKEN_PURPOSES {
            let claims = self.token_claims(&context, purpose, resolved.remove(&purpose).unwrap_or_default());
            let token = self.providers.signer.sign(&claims).await.map_err(|err| {
                warn!(purpose = ?purpose, error = %err, "token signing failed");
                match err {
                    OAuthError::Signing(_) => err,
                    other => OAuthError::Signing(other.to_string()),
                }
            })?;
            tokens.insert(purpose, token);
        }

        Ok(TokenResponse {
            access_token: tokens.remove(&Purpose::Access).unwrap_or_default(),
            token_type: Purpose::Access.token_type().to_owned(),
            expires_in: self.settings.token_ttl_secs,
            refresh_token: tokens.remove(&Purpose::Refresh),
            id_token: tokens.remove(&Purpose::Id),
            scope,
        })
    }

    /// Resolved claims first, then the reserved ones on top.
    fn token_claims(&self, context: &IssuanceContext, purpose: Purpose, resolved: ClaimSet) -> ClaimSet {
        let now = self.providers.clock.now();
        let subject = context.user.as_ref().map_or(&context.client.id, |u| &u.id);

        let mut claims = resolved;
        claims.insert("iss".into(), Value::from(self.settings.issuer.clone()));
        claims.insert("sub".into(), Value::from(subject.clone()));
        claims.insert("azp".into(), Value::from(context.client.id.clone()));
        claims.insert("iat".into(), Value::from(now.timestamp()));
        claims.insert("exp".into(), Value::from((now + self.settings.token_ttl()).timestamp()));
        claims.insert("typ".into(), Value::from(purpose.token_type()));
        if purpose == Purpose::Id {
            claims.insert("aud".into(), Value::from(context.client.id.clone()));
            if let Some(nonce) = &context.nonce {
                claims.insert("nonce".into(), Value::from(nonce.clone()));
            }
        }
        claims
    }
}
