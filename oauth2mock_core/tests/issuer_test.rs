mod common;

use std::collections::BTreeMap;

use common::{fixture, scopes};
use oauth2mock_core::{
    AuthorizationRequest, Clock, ConsentDecision, ConsentStore, Grant, GrantKind, OAuthError, TokenRequest, RESERVED_CLAIMS,
};
use serde_json::json;

fn code_request(code: &str, redirect_uri: Option<&str>) -> TokenRequest {
    TokenRequest {
        client_id: "c1".into(),
        client_secret: "s1".into(),
        grant: Grant::AuthorizationCode { code: code.into(), redirect_uri: redirect_uri.map(str::to_owned) },
    }
}

#[tokio::test]
async fn authorization_code_end_to_end() {
    let f = fixture().await;
    let code = f
        .issuer
        .authorize(AuthorizationRequest::new("c1", "profile").with_redirect_uri("https://app/cb").with_user("u1"))
        .await
        .unwrap();

    let response = f.issuer.issue(code_request(&code, Some("https://app/cb"))).await.unwrap();
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, 3600);
    assert!(response.refresh_token.is_some() && response.id_token.is_some());
    assert_eq!(response.scope.as_deref(), Some("profile"));

    let access = f.signer.last_of("Bearer");
    assert_eq!(access["role"], "admin");
    assert_eq!(access["sub"], "u1");
    assert_eq!(access["azp"], "c1");
    assert_eq!(access["iss"], "https://idp.test");

    let again = f.issuer.issue(code_request(&code, Some("https://app/cb"))).await.unwrap_err();
    assert!(matches!(again, OAuthError::InvalidGrant));
}

#[tokio::test]
async fn token_form_params_end_to_end() {
    let f = fixture().await;
    let code = f
        .issuer
        .authorize(AuthorizationRequest::new("c1", "profile").with_user("u1"))
        .await
        .unwrap();
    let params: BTreeMap<String, String> = [
        ("grant_type", "authorization_code"),
        ("client_id", "c1"),
        ("client_secret", "s1"),
        ("code", code.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    let response = f.issuer.issue(TokenRequest::from_params(&params).unwrap()).await.unwrap();
    assert_eq!(serde_json::to_value(&response).unwrap()["token_type"], "Bearer");
}

#[tokio::test]
async fn code_mismatches_are_indistinguishable() {
    let f = fixture().await;
    let request = AuthorizationRequest::new("c1", "profile").with_redirect_uri("https://app/cb").with_user("u1");

    let code = f.issuer.authorize(request.clone()).await.unwrap();
    let wrong_redirect = f.issuer.issue(code_request(&code, Some("https://app/other"))).await.unwrap_err();

    let code = f.issuer.authorize(request.clone()).await.unwrap();
    let wrong_client = f
        .issuer
        .issue(TokenRequest {
            client_id: "c2".into(),
            client_secret: "s2".into(),
            grant: Grant::AuthorizationCode { code: code.clone(), redirect_uri: Some("https://app/cb".into()) },
        })
        .await
        .unwrap_err();

    let unknown = f.issuer.issue(code_request("bogus", Some("https://app/cb"))).await.unwrap_err();

    for err in [wrong_redirect, wrong_client, unknown] {
        assert!(matches!(err, OAuthError::InvalidGrant));
        assert_eq!(err.to_json(), json!({ "error": "invalid_grant", "error_description": "invalid code" }));
    }
    // a failed exchange still burns the code
    assert!(matches!(
        f.issuer.issue(code_request(&code, Some("https://app/cb"))).await,
        Err(OAuthError::InvalidGrant)
    ));
}

#[tokio::test]
async fn expired_code_is_invalid_grant() {
    let f = fixture().await;
    let code = f.issuer.authorize(AuthorizationRequest::new("c1", "profile").with_user("u1")).await.unwrap();
    f.clock.advance(chrono::Duration::seconds(61));
    assert!(matches!(f.issuer.issue(code_request(&code, None)).await, Err(OAuthError::InvalidGrant)));
}

#[tokio::test]
async fn nonce_only_in_id_token() {
    let f = fixture().await;
    let code = f
        .issuer
        .authorize(AuthorizationRequest::new("c1", "profile").with_nonce("n-123").with_user("u1"))
        .await
        .unwrap();
    f.issuer.issue(code_request(&code, None)).await.unwrap();

    let id = f.signer.last_of("ID");
    assert_eq!(id["nonce"], "n-123");
    assert_eq!(id["aud"], "c1");
    assert!(!f.signer.last_of("Bearer").contains_key("nonce"));
    assert!(!f.signer.last_of("Refresh").contains_key("nonce"));
}

#[tokio::test]
async fn reserved_claims_win() {
    let f = fixture().await;
    f.issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "s1".into(),
            grant: Grant::Password { username: "u1".into(), password: "p1".into(), scopes: scopes(&["profile"]) },
        })
        .await
        .unwrap();

    let access = f.signer.last_of("Bearer");
    assert_eq!(access["iss"], "https://idp.test");
    assert_eq!(access["sub"], "u1");
    for name in RESERVED_CLAIMS {
        assert!(access.contains_key(name), "missing {name}");
    }
    let iat = access["iat"].as_i64().unwrap();
    assert_eq!(access["exp"].as_i64().unwrap() - iat, 3600);
}

#[tokio::test]
async fn password_grant_checks_user() {
    let f = fixture().await;
    let bad = f
        .issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "s1".into(),
            grant: Grant::Password { username: "u1".into(), password: "wrong".into(), scopes: vec![] },
        })
        .await
        .unwrap_err();
    assert!(matches!(bad, OAuthError::InvalidCredentials));

    let unknown = f
        .issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "s1".into(),
            grant: Grant::Password { username: "nobody".into(), password: "p1".into(), scopes: vec![] },
        })
        .await
        .unwrap_err();
    assert!(matches!(unknown, OAuthError::InvalidCredentials));
    assert!(f.signer.signed().is_empty());
}

#[tokio::test]
async fn bad_client_secret_rejected() {
    let f = fixture().await;
    let err = f
        .issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "nope".into(),
            grant: Grant::ClientCredentials { scopes: vec![] },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidClient));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn client_credentials_use_client_subject() {
    let f = fixture().await;
    let response = f
        .issuer
        .issue(TokenRequest {
            client_id: "c1".into(),
            client_secret: "s1".into(),
            grant: Grant::ClientCredentials { scopes: scopes(&["x"]) },
        })
        .await
        .unwrap();
    assert_eq!(response.scope.as_deref(), Some("x"));

    let access = f.signer.last_of("Bearer");
    assert_eq!(access["sub"], "c1");
    assert_eq!(access["azp"], "c1");
    assert_eq!(access["tier"], "gold");
}

#[tokio::test]
async fn one_time_consent_spans_one_issuance() {
    let f = fixture().await;
    f.stores
        .consents
        .save_consents("u1", "c1", &[ConsentDecision::grant("x", GrantKind::OneTime)])
        .await
        .unwrap();
    let password = |scopes: Vec<String>| TokenRequest {
        client_id: "c1".into(),
        client_secret: "s1".into(),
        grant: Grant::Password { username: "u1".into(), password: "p1".into(), scopes },
    };

    f.issuer.issue(password(scopes(&["x"]))).await.unwrap();
    assert_eq!(f.signer.last_of("Bearer")["c"], 3);
    assert_eq!(f.signer.last_of("ID")["c"], 3);

    f.issuer.issue(password(scopes(&["x"]))).await.unwrap();
    assert!(!f.signer.last_of("Bearer").contains_key("c"));
}

#[tokio::test]
async fn authorize_validates_request() {
    let f = fixture().await;
    let mut wrong_type = AuthorizationRequest::new("c1", "profile").with_user("u1");
    wrong_type.response_type = "token".into();
    assert!(matches!(f.issuer.authorize(wrong_type).await, Err(OAuthError::UnsupportedResponseType(_))));

    let bad_redirect = AuthorizationRequest::new("c2", "").with_redirect_uri("https://evil.example.com/cb").with_user("u1");
    assert!(matches!(f.issuer.authorize(bad_redirect).await, Err(OAuthError::InvalidRedirectUri)));

    let good_redirect = AuthorizationRequest::new("c2", "").with_redirect_uri("https://other.example.com/cb?x=1").with_user("u1");
    assert!(f.issuer.authorize(good_redirect).await.is_ok());

    let anonymous = AuthorizationRequest::new("c1", "profile");
    assert!(matches!(f.issuer.authorize(anonymous).await, Err(OAuthError::InvalidRequest(_))));

    let unknown_client = AuthorizationRequest::new("nope", "").with_user("u1");
    assert!(matches!(f.issuer.authorize(unknown_client).await, Err(OAuthError::ClientNotFound(_))));
}

#[tokio::test]
async fn userinfo_claims() {
    let f = fixture().await;
    let claims = f.issuer.userinfo("u1", "c1", &scopes(&["profile"])).await.unwrap();
    assert_eq!(claims["sub"], "u1");
    assert_eq!(claims["role"], "admin");
    assert_eq!(claims["scope"], "profile");

    let service = f.issuer.userinfo("c1", "c1", &[]).await.unwrap();
    assert_eq!(service["kind"], "service");

    assert!(matches!(f.issuer.userinfo("ghost", "c1", &[]).await, Err(OAuthError::UserNotFound(_))));
}

#[tokio::test]
async fn consent_operations_pass_through() {
    let f = fixture().await;
    f.issuer
        .save_consents("u1", "c1", &[ConsentDecision::grant("email", GrantKind::Persistent)])
        .await
        .unwrap();
    let now = f.clock.now();
    assert!(f.issuer.get_consents("u1", "c1", &scopes(&["email"])).await.unwrap()["email"].is_granted(now));
    f.issuer.clear_consents("u1", "c1").await.unwrap();
    assert!(!f.issuer.get_consents("u1", "c1", &scopes(&["email"])).await.unwrap()["email"].is_granted(now));
}
