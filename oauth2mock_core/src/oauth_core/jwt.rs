//! JWT signer backed by `jsonwebtoken`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::digest;
use serde_json::json;

use super::error::{OAuthError, Result};
use super::oauth_provider::Signer;
use super::types::ClaimSet;

/// Public half of an RSA key, as big-endian integers.
#[derive(Debug, Clone)]
pub struct RsaPublicComponents {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

/// A [`Signer`] that issues compact JWS tokens.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    algorithm: Algorithm,
    kid: Option<String>,
    public: Option<RsaPublicComponents>,
}

impl JwtSigner {
    /// HS256 with a shared secret. Nothing is published in the JWKS.
    pub fn new_hs256(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            kid: None,
            public: None,
        }
    }

    /// RS256 with a PEM private key. The key id is derived from the modulus.
    pub fn new_rs256(private_key_pem: &[u8], public: RsaPublicComponents) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| OAuthError::Config(format!("invalid RSA private key: {e}")))?;
        let kid = URL_SAFE_NO_PAD.encode(digest::digest(&digest::SHA256, &public.modulus));
        Ok(Self {
            encoding_key,
            algorithm: Algorithm::RS256,
            kid: Some(kid),
            public: Some(public),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

fn algorithm_name(alg: Algorithm) -> String {
    format!("{alg:?}")
}

#[async_trait]
impl Signer for JwtSigner {
    async fn sign(&self, claims: &ClaimSet) -> Result<String> {
        let mut header = Header::new(self.algorithm);
        header.kid = self.kid.clone();
        encode(&header, claims, &self.encoding_key).map_err(|e| OAuthError::Signing(e.to_string()))
    }

    fn jwks(&self) -> Result<Vec<u8>> {
        let keys = match &self.public {
            Some(rsa) => vec![json!({
                "kty": "RSA",
                "use": "sig",
                "alg": algorithm_name(self.algorithm),
                "kid": self.kid,
                "n": URL_SAFE_NO_PAD.encode(&rsa.modulus),
                "e": URL_SAFE_NO_PAD.encode(&rsa.exponent),
            })],
            None => Vec::new(),
        };
        serde_json::to_vec(&json!({ "keys": keys })).map_err(|e| OAuthError::Internal(e.to_string()))
    }

    fn signing_methods(&self) -> Vec<String> {
        vec![algorithm_name(self.algorithm)]
    }
}
