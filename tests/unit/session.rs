// Session manager: credentials, token validation, revocation

use chrono::{Duration, Utc};
use petclub::config::{Config, TokenRegistryKind};
use petclub::core::crypto::{Claims, TokenSigner};
use petclub::core::errors::AppError;
use petclub::core::models::Role;

use crate::common::*;

#[tokio::test]
async fn test_validate_user_checks_password() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;

    let ok = app
        .state
        .sessions
        .validate_user("ana@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(ok.map(|u| u.id), Some(user.id));

    let wrong = app
        .state
        .sessions
        .validate_user("ana@example.com", "not-the-password")
        .await
        .unwrap();
    assert!(wrong.is_none());

    let unknown = app
        .state
        .sessions
        .validate_user("nobody@example.com", PASSWORD)
        .await
        .unwrap();
    assert!(unknown.is_none());
}

#[tokio::test]
async fn test_authenticate_issues_token_for_identity() {
    let app = TestApp::new();
    let user = app.seed_user("admin@example.com", Role::Admin).await;

    let response = app
        .state
        .sessions
        .authenticate("admin@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(response.user.id, user.id);

    let identity = app.state.sessions.validate(&response.access_token).await.unwrap();
    assert_eq!(identity, crate::common::identity(&user));
}

#[tokio::test]
async fn test_authenticate_rejects_bad_credentials() {
    let app = TestApp::new();
    app.seed_user("ana@example.com", Role::Client).await;

    let err = app
        .state
        .sessions
        .authenticate("ana@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_garbage_and_foreign_tokens_rejected() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;

    let err = app.state.sessions.validate("not.a.token").await.unwrap_err();
    assert!(err.is_authentication());

    let foreign = TokenSigner::new(
        &secrecy::Secret::new("some-other-secret".to_string()),
        Duration::hours(1),
    );
    let (token, _) = foreign.issue(&user).unwrap();
    let err = app.state.sessions.validate(&token).await.unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let signer = TokenSigner::new(&Config::test_config().jwt_secret, Duration::hours(1));

    let claims = Claims::for_user(&user, Utc::now() - Duration::hours(2), Duration::hours(1));
    let token = signer.sign(&claims).unwrap();

    let err = app.state.sessions.validate(&token).await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));
}

#[tokio::test]
async fn test_logout_revokes_only_that_token() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let first = app.token_for(&user);
    let signer = TokenSigner::new(&Config::test_config().jwt_secret, Duration::hours(1));
    // a distinct token for the same user
    let second = signer
        .sign(&Claims::for_user(&user, Utc::now() - Duration::seconds(5), Duration::hours(1)))
        .unwrap();
    assert_ne!(first, second);

    app.state.sessions.logout(&user.id, &first).await;

    let err = app.state.sessions.validate(&first).await.unwrap_err();
    assert_eq!(err.to_string(), AppError::revoked_token().to_string());
    assert!(app.state.sessions.validate(&second).await.is_ok());
}

#[tokio::test]
async fn test_logout_twice_is_idempotent() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let token = app.token_for(&user);

    app.state.sessions.logout(&user.id, &token).await;
    app.state.sessions.logout(&user.id, &token).await;

    assert!(app.state.sessions.validate(&token).await.is_err());
}

#[tokio::test]
async fn test_cache_registry_shares_revocations_through_cache() {
    let config = Config {
        token_registry: TokenRegistryKind::Cache,
        ..Config::test_config()
    };
    let app = TestApp::with_config(config);
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let token = app.token_for(&user);

    assert!(app.state.sessions.validate(&token).await.is_ok());
    app.cache.clear_ops();

    app.state.sessions.logout(&user.id, &token).await;
    let written: Vec<_> = app
        .cache
        .ops()
        .into_iter()
        .filter_map(|op| match op {
            CacheOp::Set(key) => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("revoked:"));
    assert!(!written[0].contains(&token), "raw token must not be a cache key");

    let err = app.state.sessions.validate(&token).await.unwrap_err();
    assert!(err.is_authentication());
}

/// Logs a short-lived token out, then validates it inside its `exp` second,
/// where the signature check alone still accepts it.
async fn assert_revoked_through_exp_second(config: Config) {
    let app = TestApp::with_config(config.clone());
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let signer = TokenSigner::new(&config.jwt_secret, Duration::hours(1));
    let claims = Claims::for_user(&user, Utc::now(), Duration::seconds(2));
    let token = signer.sign(&claims).unwrap();

    app.state.sessions.logout(&user.id, &token).await;
    assert!(app.state.sessions.validate(&token).await.is_err());

    let boundary = claims.expires_at() + Duration::milliseconds(300) - Utc::now();
    tokio::time::sleep(boundary.to_std().unwrap_or_default()).await;
    assert!(signer.verify(&token).is_ok(), "still inside the exp second");

    // a later logout prunes the in-memory registry
    let other = app.token_for(&user);
    app.state.sessions.logout(&user.id, &other).await;

    let err = app.state.sessions.validate(&token).await.unwrap_err();
    assert_eq!(err.to_string(), AppError::revoked_token().to_string());
}

#[tokio::test]
async fn test_memory_revocation_outlives_exp_second() {
    assert_revoked_through_exp_second(Config::test_config()).await;
}

#[tokio::test]
async fn test_cache_revocation_outlives_exp_second() {
    let config = Config {
        token_registry: TokenRegistryKind::Cache,
        ..Config::test_config()
    };
    assert_revoked_through_exp_second(config).await;
}
