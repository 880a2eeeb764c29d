use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oauth2mock::{
    init_tracing, AuthServer, AuthorizationRequest, ClaimSet, ConfigDocument, ConsentDecision, Grant, GrantKind,
    OAuthError, Signer, TokenRequest,
};

#[derive(Default)]
struct RecordingSigner {
    signed: Mutex<Vec<ClaimSet>>,
}

impl RecordingSigner {
    fn access_claims(&self) -> Vec<ClaimSet> {
        self.signed.lock().unwrap().iter().filter(|c| c["typ"] == "Bearer").cloned().collect()
    }
}

#[async_trait]
impl Signer for RecordingSigner {
    async fn sign(&self, claims: &ClaimSet) -> Result<String, OAuthError> {
        self.signed.lock().unwrap().push(claims.clone());
        Ok("signed".into())
    }

    fn jwks(&self) -> Result<Vec<u8>, OAuthError> {
        Ok(br#"{"keys":[]}"#.to_vec())
    }

    fn signing_methods(&self) -> Vec<String> {
        vec!["RS256".into()]
    }
}

const CONFIG: &str = r#"{
    "settings": { "issuer": "https://idp.test", "sweep_interval_secs": 1 },
    "scopes": { "profile": { "requireConsent": true } },
    "clients": { "c1": { "client_secret": "s1", "redirect_uri": "https://app/cb" } },
    "users": { "users": {
        "u1": { "username": "u1", "password": "p1",
                "claims": { "default": { "base": { "role": "admin" } } } }
    } }
}"#;

fn exchange(code: &str) -> TokenRequest {
    TokenRequest {
        client_id: "c1".into(),
        client_secret: "s1".into(),
        grant: Grant::AuthorizationCode { code: code.into(), redirect_uri: Some("https://app/cb".into()) },
    }
}

#[tokio::test]
async fn code_grant_scenario() {
    init_tracing(None);
    let signer = Arc::new(RecordingSigner::default());
    let server = AuthServer::from_json(CONFIG, signer.clone()).await.unwrap();

    server
        .issuer()
        .save_consents("u1", "c1", &[ConsentDecision::grant("profile", GrantKind::Persistent)])
        .await
        .unwrap();
    let code = server
        .issuer()
        .authorize(AuthorizationRequest::new("c1", "profile").with_redirect_uri("https://app/cb").with_user("u1"))
        .await
        .unwrap();

    let response = server.issuer().issue(exchange(&code)).await.unwrap();
    assert_eq!(response.scope.as_deref(), Some("profile"));
    let access = signer.access_claims().pop().unwrap();
    assert_eq!(access["role"], "admin");
    assert_eq!(access["sub"], "u1");
    assert_eq!(access["azp"], "c1");
    assert_eq!(access["scope"], "profile");

    let second = server.issuer().issue(exchange(&code)).await.unwrap_err();
    assert!(matches!(second, OAuthError::InvalidGrant));

    server.shutdown().await;
}

#[tokio::test]
async fn discovery_and_jwks() {
    let server = AuthServer::from_json(CONFIG, Arc::new(RecordingSigner::default())).await.unwrap();
    assert_eq!(server.discovery().authorization_endpoint, "https://idp.test/authorize");
    assert_eq!(server.discovery().id_token_signing_alg_values_supported, vec!["RS256"]);
    assert_eq!(server.jwks().unwrap(), br#"{"keys":[]}"#.to_vec());
    server.shutdown().await;
}

#[tokio::test]
async fn reload_changes_policy() {
    let server = AuthServer::from_json(CONFIG, Arc::new(RecordingSigner::default())).await.unwrap();
    let scopes = vec!["email".to_string()];
    assert!(server.issuer().get_consents("u1", "c1", &scopes).await.is_err());

    let updated = CONFIG.replace(r#""profile": { "requireConsent": true }"#, r#""profile": {}, "email": {}"#);
    server.reload(&ConfigDocument::from_json(&updated).unwrap()).await;
    assert!(server.issuer().get_consents("u1", "c1", &scopes).await.is_ok());
    server.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_reported() {
    let err = AuthServer::from_json(r#"{ "settings": { "issuer": "" } }"#, Arc::new(RecordingSigner::default()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OAuthError::Config(_)));
}
