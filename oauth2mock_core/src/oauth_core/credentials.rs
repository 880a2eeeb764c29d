//! Presented credentials and the stored schemes they are checked against.

use std::fmt;

use oauth2mock_lib::{hash_secret, verify_secret};
use tracing::warn;

use super::error::{OAuthError, Result};

/// The only client assertion type recognised.
pub const JWT_BEARER_ASSERTION: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Credentials as presented by a caller. Exactly one method per value.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    UserPassword { username: String, password: String },
    ClientSecret { client_id: String, secret: String },
    ClientAssertion { assertion_type: String, assertion: String },
}

impl Credentials {
    pub fn user_password(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let (username, password) = (username.into(), password.into());
        if username.is_empty() {
            return Err(OAuthError::InvalidRequest("missing username".into()));
        }
        Ok(Credentials::UserPassword { username, password })
    }

    pub fn client_secret(client_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let (client_id, secret) = (client_id.into(), secret.into());
        if client_id.is_empty() {
            return Err(OAuthError::InvalidRequest("missing client_id".into()));
        }
        Ok(Credentials::ClientSecret { client_id, secret })
    }

    pub fn client_assertion(assertion_type: impl Into<String>, assertion: impl Into<String>) -> Result<Self> {
        let assertion_type = assertion_type.into();
        if assertion_type != JWT_BEARER_ASSERTION {
            return Err(OAuthError::InvalidRequest(format!(
                "unsupported client_assertion_type {assertion_type}"
            )));
        }
        Ok(Credentials::ClientAssertion { assertion_type, assertion: assertion.into() })
    }

    /// Username or client id; the assertion type for assertions.
    pub fn identity_name(&self) -> &str {
        match self {
            Credentials::UserPassword { username, .. } => username,
            Credentials::ClientSecret { client_id, .. } => client_id,
            Credentials::ClientAssertion { assertion_type, .. } => assertion_type,
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            Credentials::UserPassword { password, .. } => password,
            Credentials::ClientSecret { secret, .. } => secret,
            Credentials::ClientAssertion { assertion, .. } => assertion,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Credentials::UserPassword { .. } => "user_password",
            Credentials::ClientSecret { .. } => "client_secret",
            Credentials::ClientAssertion { .. } => "client_assertion",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("method", &self.method())
            .field("identity", &self.identity_name())
            .finish_non_exhaustive()
    }
}

/// Which credential method a stored scheme accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    UserPassword,
    ClientSecret,
}

/// Stored side of authentication: identity plus a salted, iterated hash.
#[derive(Clone)]
pub struct AuthenticationScheme {
    kind: SchemeKind,
    identity: String,
    secret_hash: String,
}

impl AuthenticationScheme {
    /// Hashes `secret` immediately; the plaintext is not retained.
    pub fn new(kind: SchemeKind, identity: impl Into<String>, secret: &str) -> Result<Self> {
        Ok(Self { kind, identity: identity.into(), secret_hash: hash_secret(secret)? })
    }

    /// Wraps an already computed hash.
    pub fn from_hash(kind: SchemeKind, identity: impl Into<String>, secret_hash: impl Into<String>) -> Self {
        Self { kind, identity: identity.into(), secret_hash: secret_hash.into() }
    }

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// True when `credentials` use this scheme's method, name the same
    /// identity and carry a secret that verifies against the stored hash.
    ///
    /// Never fails: a method mismatch, a client assertion or a corrupt
    /// stored hash all answer `false`.
    pub fn matches(&self, credentials: &Credentials) -> bool {
        let method_ok = match (self.kind, credentials) {
            (SchemeKind::UserPassword, Credentials::UserPassword { .. }) => true,
            (SchemeKind::ClientSecret, Credentials::ClientSecret { .. }) => true,
            (_, Credentials::ClientAssertion { .. }) => return false,
            _ => false,
        };
        if !method_ok || self.identity != credentials.identity_name() {
            return false;
        }
        match verify_secret(credentials.secret(), &self.secret_hash) {
            Ok(ok) => ok,
            Err(err) => {
                warn!(identity = %self.identity, error = %err, "stored secret hash is unusable");
                false
            }
        }
    }

    /// Like [`matches`](Self::matches) but names unsupported methods.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        if let Credentials::ClientAssertion { .. } = credentials {
            return Err(OAuthError::Unsupported("client assertion authentication".into()));
        }
        if self.matches(credentials) {
            Ok(())
        } else {
            Err(match self.kind {
                SchemeKind::ClientSecret => OAuthError::InvalidClient,
                SchemeKind::UserPassword => OAuthError::InvalidCredentials,
            })
        }
    }
}

impl fmt::Debug for AuthenticationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationScheme")
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
