//! Error taxonomy for the authorization engine.

use serde_json::{json, Value};
use tracing::warn;

/// Coarse classification the HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing request field.
    InvalidArgument,
    /// Credential mismatch or an invalid, expired or consumed code.
    Unauthenticated,
    /// Unknown scope, client, user or claims record.
    NotFound,
    /// Hashing, signing or other unexpected failure.
    Internal,
    /// A recognised but unimplemented mechanism.
    Unsupported,
}

/// Core OAuth2 error kinds.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unsupported response type: {0}")]
    UnsupportedResponseType(String),
    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),
    #[error("redirect uri not allowed for client")]
    InvalidRedirectUri,
    /// User authentication failed.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The client authentication failed.
    #[error("client authentication failed")]
    InvalidClient,
    /// Unknown, expired, consumed or mismatched authorization code.
    #[error("invalid code")]
    InvalidGrant,
    #[error("client not found: {0}")]
    ClientNotFound(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("undefined scope: {0}")]
    UndefinedScope(String),
    #[error("no claims for subject: {0}")]
    NoClaimsForSubject(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OAuthError>;

impl From<oauth2mock_lib::Error> for OAuthError {
    fn from(err: oauth2mock_lib::Error) -> Self {
        OAuthError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(err: serde_json::Error) -> Self {
        OAuthError::Config(err.to_string())
    }
}

impl OAuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::InvalidRequest(_)
            | OAuthError::UnsupportedResponseType(_)
            | OAuthError::UnsupportedGrantType(_)
            | OAuthError::InvalidRedirectUri => ErrorKind::InvalidArgument,
            OAuthError::InvalidCredentials | OAuthError::InvalidClient | OAuthError::InvalidGrant => {
                ErrorKind::Unauthenticated
            }
            OAuthError::ClientNotFound(_)
            | OAuthError::UserNotFound(_)
            | OAuthError::UndefinedScope(_)
            | OAuthError::NoClaimsForSubject(_) => ErrorKind::NotFound,
            OAuthError::Unsupported(_) => ErrorKind::Unsupported,
            OAuthError::Config(_) | OAuthError::Signing(_) | OAuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// RFC 6749 error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) | OAuthError::InvalidRedirectUri => "invalid_request",
            OAuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::InvalidClient | OAuthError::ClientNotFound(_) => "invalid_client",
            OAuthError::InvalidCredentials | OAuthError::InvalidGrant | OAuthError::UserNotFound(_) => "invalid_grant",
            OAuthError::UndefinedScope(_) => "invalid_scope",
            OAuthError::Unsupported(_) => "unauthorized_client",
            OAuthError::NoClaimsForSubject(_)
            | OAuthError::Config(_)
            | OAuthError::Signing(_)
            | OAuthError::Internal(_) => "server_error",
        }
    }

    /// HTTP status the token endpoint should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::InvalidClient | OAuthError::ClientNotFound(_) => 401,
            _ => match self.kind() {
                ErrorKind::Internal => 500,
                _ if matches!(self, OAuthError::NoClaimsForSubject(_)) => 500,
                _ => 400,
            },
        }
    }

    fn description(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_owned(),
            _ if matches!(self, OAuthError::NoClaimsForSubject(_)) => "Internal server error".to_owned(),
            // unknown user and bad password look the same
            _ if matches!(self, OAuthError::UserNotFound(_)) => OAuthError::InvalidCredentials.to_string(),
            _ => self.to_string(),
        }
    }

    /// JSON error body. Server-side details stay in the log.
    pub fn to_json(&self) -> Value {
        let code = self.error_code();
        let status = self.status_code();
        warn!(error = %self, error_code = code, http_status = status, "OAuth error occurred");
        json!({
            "error": code,
            "error_description": self.description(),
        })
    }
}
