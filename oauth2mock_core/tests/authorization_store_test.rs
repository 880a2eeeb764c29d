use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use oauth2mock_core::{AuthorizationRequest, AuthorizationStore, InMemoryAuthorizationStore, ManualClock};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemption_has_one_winner() {
    let store = Arc::new(InMemoryAuthorizationStore::new(Duration::seconds(60), 32));
    for _ in 0..20 {
        let code = store.store(AuthorizationRequest::new("c1", "profile").with_user("u1")).await.unwrap();
        let attempts = (0..16).map(|_| {
            let store = store.clone();
            let code = code.clone();
            tokio::spawn(async move { store.redeem(&code).await })
        });
        let winners = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
    }
}

#[tokio::test]
async fn redeemed_code_stays_gone_after_sweep() {
    let clock = ManualClock::default();
    let store = InMemoryAuthorizationStore::with_clock(Duration::seconds(60), 32, Arc::new(clock.clone()));
    let code = store.store(AuthorizationRequest::new("c1", "")).await.unwrap();
    assert!(store.redeem(&code).await.is_some());
    clock.advance(Duration::seconds(120));
    assert_eq!(store.sweep().await, 0);
    assert!(store.redeem(&code).await.is_none());
}

#[tokio::test]
async fn expired_and_unknown_look_the_same() {
    let clock = ManualClock::default();
    let store = InMemoryAuthorizationStore::with_clock(Duration::seconds(5), 32, Arc::new(clock.clone()));
    let code = store.store(AuthorizationRequest::new("c1", "")).await.unwrap();
    clock.advance(Duration::seconds(6));
    assert_eq!(store.redeem(&code).await, store.redeem("never-issued").await);
}
