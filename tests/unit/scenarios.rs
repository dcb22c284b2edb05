// End-to-end flows over the repositories

use petclub::core::errors::AppError;
use petclub::core::models::{CreatePet, CreateUser, Role, UpdatePet};

use crate::common::*;

#[tokio::test]
async fn test_ownership_flow_between_two_clients_and_admin() {
    let app = TestApp::new();
    let a = app.seed_user("a@example.com", Role::Client).await;
    let b = app.seed_user("b@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;

    let p1 = app
        .state
        .pets
        .create(CreatePet { name: "P1".to_string(), ..Default::default() }, &identity(&a))
        .await
        .unwrap();
    let id = p1.id.to_string();

    // A lists and caches their own pets
    let listed = app.state.pets.find_all(Role::Client, &a.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(app.state.pets.find_all(Role::Client, &b.id).await.unwrap().is_empty());

    let err = app.state.pets.find_one(&id, Role::Client, &b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let seen = app.state.pets.find_one(&id, Role::Admin, &admin.id).await.unwrap();
    assert_eq!(seen.id, p1.id);

    let patch = UpdatePet { name: Some("P1 renamed".to_string()), ..Default::default() };
    app.state.pets.update(&id, patch, Role::Client, &a.id).await.unwrap();

    let listed = app.state.pets.find_all(Role::Client, &a.id).await.unwrap();
    assert_eq!(listed[0].name, "P1 renamed", "listing must reflect the update");
    let all = app.state.pets.find_all(Role::Admin, &admin.id).await.unwrap();
    assert_eq!(all[0].name, "P1 renamed");

    app.state.pets.remove(&id, Role::Admin, &admin.id).await.unwrap();
    assert!(app.state.pets.find_all(Role::Client, &a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_then_login() {
    let app = TestApp::new();
    let payload = CreateUser {
        name: "Ana".to_string(),
        email: "ana@example.com".to_string(),
        password: "secret-pass".to_string(),
        role: Role::Client,
    };

    app.state.users.create(payload.clone()).await.unwrap();
    let err = app.state.users.create(payload).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(app.state.users.find_all().await.unwrap().len(), 1);

    let session = app
        .state
        .sessions
        .authenticate("ana@example.com", "secret-pass")
        .await
        .unwrap();
    let identity = app.state.sessions.validate(&session.access_token).await.unwrap();
    assert_eq!(identity.role, Role::Client);
    assert_eq!(identity.email, "ana@example.com");
}

#[tokio::test]
async fn test_session_survives_cache_outage_until_logout() {
    let app = TestApp::new();
    let user = app.seed_user("ana@example.com", Role::Client).await;
    let token = app.token_for(&user);
    app.cache.set_failing(true);

    let caller = app.state.sessions.validate(&token).await.unwrap();
    let pet = app
        .state
        .pets
        .create(CreatePet { name: "Rex".to_string(), ..Default::default() }, &identity(&user))
        .await
        .unwrap();
    let found = app
        .state
        .pets
        .find_one(&pet.id.to_string(), caller.role, &caller.user_id)
        .await
        .unwrap();
    assert_eq!(found.id, pet.id);

    app.state.sessions.logout(&caller.user_id, &token).await;
    assert!(app.state.sessions.validate(&token).await.is_err());
}
