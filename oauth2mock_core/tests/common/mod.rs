#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use oauth2mock_core::{ClaimSet, ConfigDocument, InMemoryProviders, ManualClock, OAuthError, Signer, TokenIssuer};
use serde_json::{json, Value};

/// Signer double that keeps every claim set it was asked to sign.
#[derive(Default)]
pub struct RecordingSigner {
    signed: Mutex<Vec<ClaimSet>>,
}

impl RecordingSigner {
    pub fn signed(&self) -> Vec<ClaimSet> {
        self.signed.lock().unwrap().clone()
    }

    /// Claims of the token whose `typ` is `typ`, from the latest issuance.
    pub fn last_of(&self, typ: &str) -> ClaimSet {
        self.signed()
            .into_iter()
            .rev()
            .find(|c| c["typ"] == typ)
            .unwrap_or_else(|| panic!("no {typ} token signed"))
    }
}

#[async_trait]
impl Signer for RecordingSigner {
    async fn sign(&self, claims: &ClaimSet) -> Result<String, OAuthError> {
        let mut signed = self.signed.lock().unwrap();
        signed.push(claims.clone());
        Ok(format!("token-{}", signed.len()))
    }

    fn jwks(&self) -> Result<Vec<u8>, OAuthError> {
        Ok(br#"{"keys":[]}"#.to_vec())
    }

    fn signing_methods(&self) -> Vec<String> {
        vec!["RS256".into()]
    }
}

pub struct Fixture {
    pub issuer: TokenIssuer,
    pub stores: InMemoryProviders,
    pub signer: Arc<RecordingSigner>,
    pub clock: ManualClock,
}

pub fn base_document() -> Value {
    json!({
        "settings": { "issuer": "https://idp.test" },
        "scopes": {
            "profile": { "requireConsent": false },
            "x": { "requireConsent": true },
            "email": { "requireConsent": true }
        },
        "clients": {
            "c1": { "client_secret": "s1", "redirect_uri": "https://app/cb",
                    "claims": { "default": { "base": { "kind": "service" },
                                             "scopeOverrides": { "x": { "tier": "gold" } } } } },
            "c2": { "client_secret": "s2", "redirect_uri": "https://other.example.com/*" }
        },
        "users": { "users": {
            "u1": {
                "username": "u1",
                "password": "p1",
                "claims": {
                    "default": {
                        "base": { "role": "admin", "a": 1, "b": 1 },
                        "clientOverrides": { "c1": { "b": 2 } },
                        "scopeOverrides": { "x": { "c": 3 }, "email": { "email": "u1@example.com" } }
                    },
                    "byPurpose": {
                        "id": { "base": { "b": "id-layer" } },
                        "access": { "base": { "iss": "spoofed", "sub": "spoofed" } }
                    }
                }
            },
            "u2": { "username": "bob", "password": "p2" }
        } }
    })
}

pub async fn fixture() -> Fixture {
    fixture_with(base_document()).await
}

pub async fn fixture_with(doc: Value) -> Fixture {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    let doc = ConfigDocument::from_value(doc).unwrap();
    let stores = InMemoryProviders::from_document(&doc, Arc::new(clock.clone())).await.unwrap();
    let signer = Arc::new(RecordingSigner::default());
    let issuer = TokenIssuer::new(stores.providers(signer.clone()), doc.settings.clone());
    Fixture { issuer, stores, signer, clock }
}

pub fn scopes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
