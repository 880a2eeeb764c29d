use serde::{Deserialize, Serialize};

use crate::oauth_core::oauth_provider::Signer;
use crate::oauth_core::types::GrantType;

/// Body of `/.well-known/openid-configuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub grant_types_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
}

impl OidcDiscovery {
    /// Builds the document for `issuer`, advertising the signer's algorithms.
    pub fn new(issuer: &str, signer: &dyn Signer) -> Self {
        let base = issuer.trim_end_matches('/');
        Self {
            issuer: issuer.to_owned(),
            authorization_endpoint: format!("{base}/authorize"),
            token_endpoint: format!("{base}/token"),
            userinfo_endpoint: format!("{base}/userinfo"),
            jwks_uri: format!("{base}/.well-known/jwks.json"),
            grant_types_supported: GrantType::ALL.iter().map(|g| g.as_str().to_owned()).collect(),
            response_types_supported: vec!["code".to_owned()],
            response_modes_supported: vec!["query".to_owned()],
            subject_types_supported: vec!["public".to_owned()],
            id_token_signing_alg_values_supported: signer.signing_methods(),
        }
    }
}
