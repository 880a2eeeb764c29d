#![cfg(feature = "openid")]

mod common;

use oauth2mock_core::openid::discovery::OidcDiscovery;
use oauth2mock_core::Signer;

#[test]
fn discovery_document_from_issuer() {
    let signer = common::RecordingSigner::default();
    let doc = OidcDiscovery::new("https://idp.test/", &signer);
    assert_eq!(doc.issuer, "https://idp.test/");
    assert_eq!(doc.token_endpoint, "https://idp.test/token");
    assert_eq!(doc.jwks_uri, "https://idp.test/.well-known/jwks.json");
    assert_eq!(doc.grant_types_supported, vec!["authorization_code", "client_credentials", "password"]);
    assert_eq!(doc.id_token_signing_alg_values_supported, signer.signing_methods());

    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["response_types_supported"][0], "code");
    assert_eq!(json["subject_types_supported"][0], "public");
}

#[cfg(feature = "jwt")]
#[tokio::test]
async fn issued_tokens_verify_with_shared_secret() {
    use std::sync::Arc;

    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use oauth2mock_core::{
        AuthorizationRequest, ConfigDocument, Grant, InMemoryProviders, JwtSigner, SystemClock, TokenIssuer, TokenRequest,
    };
    use serde_json::Value;

    let doc = ConfigDocument::from_value(common::base_document()).unwrap();
    let stores = InMemoryProviders::from_document(&doc, Arc::new(SystemClock)).await.unwrap();
    let issuer = TokenIssuer::new(stores.providers(Arc::new(JwtSigner::new_hs256(b"secret"))), doc.settings.clone());

    let code = issuer.authorize(AuthorizationRequest::new("c1", "profile").with_user("u1")).await.unwrap();
    let response = issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "s1".into(),
            grant: Grant::AuthorizationCode { code, redirect_uri: None },
        })
        .await
        .unwrap();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["c1"]);
    let id = decode::<Value>(&response.id_token.unwrap(), &DecodingKey::from_secret(b"secret"), &validation).unwrap();
    assert_eq!(id.claims["sub"], "u1");
    assert_eq!(id.claims["typ"], "ID");
}
