//! OAuth2 core primitives: clients, users, authorization requests, grants
//! and token responses.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use oauth2mock_lib::WildcardPattern;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::credentials::AuthenticationScheme;
use super::error::OAuthError;

/// Claim name to JSON value. Insertion order is irrelevant to consumers.
pub type ClaimSet = Map<String, Value>;

/// Splits a space-delimited scope string, keeping order and dropping empties.
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope.split(' ').filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

/// Joins scopes back into their wire form.
pub fn join_scopes<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
}

/// Represents a registered OAuth 2.0 client application.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client identifier.
    pub id: String,
    /// Registered redirect URI, possibly containing `*` wildcards.
    pub redirect_uri: WildcardPattern,
    /// Stored secret hash.
    pub scheme: AuthenticationScheme,
}

impl Client {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id
    }

    pub fn authentication_scheme(&self) -> &AuthenticationScheme {
        &self.scheme
    }

    /// Whether `uri` is allowed by the registered redirect pattern.
    pub fn allows_redirect(&self, uri: &str) -> bool {
        self.redirect_uri.is_match(uri)
    }
}

/// A resource owner known to the user directory.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable subject identifier, emitted as `sub`.
    pub id: String,
    /// Login name.
    pub username: String,
    pub scheme: AuthenticationScheme,
    /// Named attribute groups, e.g. `"profile"` or `"address"`.
    pub attributes: BTreeMap<String, ClaimSet>,
}

impl User {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.username
    }

    pub fn authentication_scheme(&self) -> &AuthenticationScheme {
        &self.scheme
    }

    pub fn attributes_group(&self, group: &str) -> Option<&ClaimSet> {
        self.attributes.get(group)
    }
}

/// An in-flight authorization attempt, stored under a single-use code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub response_type: String,
    /// Redirect URI sent by the client, if any.
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub client_id: String,
    /// Set once the resource owner has logged in.
    pub user_id: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(client_id: impl Into<String>, scope: &str) -> Self {
        Self {
            response_type: "code".to_owned(),
            redirect_uri: None,
            scopes: parse_scopes(scope),
            state: None,
            nonce: None,
            client_id: client_id.into(),
            user_id: None,
        }
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The redirect URI the response goes to: the requested one, or the
    /// client's registered value when none was sent.
    pub fn effective_redirect_uri<'a>(&'a self, client: &'a Client) -> &'a str {
        self.redirect_uri.as_deref().unwrap_or_else(|| client.redirect_uri.as_str())
    }

    /// Checks the request against the client it names.
    pub fn validate(&self, client: &Client) -> Result<(), OAuthError> {
        if self.response_type.is_empty() {
            return Err(OAuthError::InvalidRequest("missing response_type".into()));
        }
        if self.response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType(self.response_type.clone()));
        }
        if self.client_id != client.id {
            return Err(OAuthError::InvalidClient);
        }
        if let Some(uri) = &self.redirect_uri {
            if !client.allows_redirect(uri) {
                return Err(OAuthError::InvalidRedirectUri);
            }
        }
        Ok(())
    }
}

/// Grant types accepted at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    Password,
}

impl GrantType {
    pub const ALL: [GrantType; 3] = [
        GrantType::AuthorizationCode,
        GrantType::ClientCredentials,
        GrantType::Password,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::Password => "password",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GrantType::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| OAuthError::UnsupportedGrantType(s.to_owned()))
    }
}

/// OAuth2 grant with its grant-specific parameters.
#[derive(Debug, Clone)]
pub enum Grant {
    /// Exchange of a previously issued authorization code.
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
    },
    /// Client acting on its own behalf.
    ClientCredentials { scopes: Vec<String> },
    /// Resource owner password credentials.
    Password {
        username: String,
        password: String,
        scopes: Vec<String>,
    },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Grant::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Grant::ClientCredentials { .. } => GrantType::ClientCredentials,
            Grant::Password { .. } => GrantType::Password,
        }
    }
}

/// A token endpoint call: authenticated client plus the grant it presents.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant: Grant,
}

impl TokenRequest {
    /// Maps decoded form parameters onto a typed request.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, OAuthError> {
        let field = |name: &str| -> Result<String, OAuthError> {
            params
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| OAuthError::InvalidRequest(format!("missing {name}")))
        };
        let scopes = || params.get("scope").map(|s| parse_scopes(s)).unwrap_or_default();

        let grant = match field("grant_type")?.parse::<GrantType>()? {
            GrantType::AuthorizationCode => Grant::AuthorizationCode {
                code: field("code")?,
                redirect_uri: params.get("redirect_uri").cloned(),
            },
            GrantType::ClientCredentials => Grant::ClientCredentials { scopes: scopes() },
            GrantType::Password => Grant::Password {
                username: field("username")?,
                password: field("password")?,
                scopes: scopes(),
            },
        };
        Ok(Self {
            client_id: field("client_id")?,
            client_secret: field("client_secret")?,
            grant,
        })
    }
}

/// What a claim set is being built for. Each purpose may carry its own
/// claim layer on top of the subject's default layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Access,
    Refresh,
    Id,
    #[serde(rename = "userinfo")]
    UserInfo,
}

impl Purpose {
    /// Value of the `typ` claim for tokens of this purpose.
    pub fn token_type(&self) -> &'static str {
        match self {
            Purpose::Access => "Bearer",
            Purpose::Refresh => "Refresh",
            Purpose::Id => "ID",
            Purpose::UserInfo => "UserInfo",
        }
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
