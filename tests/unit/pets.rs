// Pet repository: cache-aside protocol and ownership checks

use petclub::config::Config;
use petclub::core::errors::AppError;
use petclub::core::models::{CreatePet, Pet, Role, UpdatePet};
use std::sync::Arc;

use crate::common::*;

fn rex() -> CreatePet {
    CreatePet {
        name: "Rex".to_string(),
        species: Some("dog".to_string()),
        age: Some(3.0),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_find_all_populates_then_serves_from_cache() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    app.reset_counters();

    let first = app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(app.store.calls(), 1);
    assert!(app.cache.contains(&format!("pets:user:{}", owner.id)).await);

    let second = app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(app.store.calls(), 1, "second read must be a cache hit");
}

#[tokio::test]
async fn test_admin_and_client_listings_use_distinct_keys() {
    let app = TestApp::new();
    let ana = app.seed_user("ana@example.com", Role::Client).await;
    let bob = app.seed_user("bob@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    app.state.pets.create(rex(), &identity(&ana)).await.unwrap();
    app.state
        .pets
        .create(CreatePet { name: "Tom".to_string(), ..Default::default() }, &identity(&bob))
        .await
        .unwrap();

    let all = app.state.pets.find_all(Role::Admin, &admin.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|p| p.owner.as_ref().unwrap().email.is_some()));

    let mine = app.state.pets.find_all(Role::Client, &ana.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].name, "Rex");

    assert!(app.cache.contains("pets:all").await);
    assert!(app.cache.contains(&format!("pets:user:{}", ana.id)).await);
}

#[tokio::test]
async fn test_create_invalidates_collection_keys() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;

    assert!(app.state.pets.find_all(Role::Admin, &admin.id).await.unwrap().is_empty());
    assert!(app.state.pets.find_all(Role::Client, &owner.id).await.unwrap().is_empty());

    let created = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    assert!(!app.cache.contains("pets:all").await);
    assert!(!app.cache.contains(&format!("pets:user:{}", owner.id)).await);

    let all = app.state.pets.find_all(Role::Admin, &admin.id).await.unwrap();
    assert_eq!(all.len(), 1);
    let mine = app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    assert_eq!(mine[0].id, created.id);
}

#[tokio::test]
async fn test_created_pet_is_owned_by_caller() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;

    let created = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    assert_eq!(created.owner_id(), Some(&owner.id));
    assert_eq!(created.name, "Rex");
    assert_eq!(created.age, Some(3.0));
}

#[tokio::test]
async fn test_update_invalidates_entity_and_collections() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    let id = pet.id.to_string();

    app.state.pets.find_one(&id, Role::Client, &owner.id).await.unwrap();
    app.state.pets.find_all(Role::Admin, &admin.id).await.unwrap();
    app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    assert!(app.cache.contains(&format!("pet:{}", id)).await);

    let patch = UpdatePet { name: Some("Max".to_string()), ..Default::default() };
    let updated = app.state.pets.update(&id, patch, Role::Client, &owner.id).await.unwrap();
    assert_eq!(updated.name, "Max");
    assert_eq!(updated.species.as_deref(), Some("dog"));

    assert!(!app.cache.contains(&format!("pet:{}", id)).await);
    assert!(!app.cache.contains("pets:all").await);
    assert!(!app.cache.contains(&format!("pets:user:{}", owner.id)).await);

    let reread = app.state.pets.find_one(&id, Role::Client, &owner.id).await.unwrap();
    assert_eq!(reread.name, "Max");
}

#[tokio::test]
async fn test_update_reads_store_not_cache() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    let id = pet.id.to_string();
    app.state.pets.find_one(&id, Role::Client, &owner.id).await.unwrap();
    app.cache.clear_ops();

    let patch = UpdatePet { breed: Some("Labrador".to_string()), ..Default::default() };
    app.state.pets.update(&id, patch, Role::Client, &owner.id).await.unwrap();

    assert!(app
        .cache
        .ops()
        .iter()
        .all(|op| !matches!(op, CacheOp::Get(_) | CacheOp::Set(_))));
}

#[tokio::test]
async fn test_remove_invalidates_and_deletes() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    let id = pet.id.to_string();

    app.state.pets.find_one(&id, Role::Client, &owner.id).await.unwrap();
    app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();

    let removed = app.state.pets.remove(&id, Role::Client, &owner.id).await.unwrap();
    assert_eq!(removed.id, pet.id);
    assert!(!app.cache.contains(&format!("pet:{}", id)).await);
    assert!(!app.cache.contains(&format!("pets:user:{}", owner.id)).await);

    let err = app.state.pets.find_one(&id, Role::Client, &owner.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(app.state.pets.find_all(Role::Client, &owner.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_other_client_denied_on_miss_and_hit() {
    let app = TestApp::new();
    let ana = app.seed_user("ana@example.com", Role::Client).await;
    let bob = app.seed_user("bob@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&ana)).await.unwrap();
    let id = pet.id.to_string();

    // miss
    let err = app.state.pets.find_one(&id, Role::Client, &bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
    assert!(!app.cache.contains(&format!("pet:{}", id)).await);

    // hit
    app.state.pets.find_one(&id, Role::Client, &ana.id).await.unwrap();
    app.store.reset_calls();
    let err = app.state.pets.find_one(&id, Role::Client, &bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
    assert_eq!(app.store.calls(), 0, "denial must come from the cached owner");
}

#[tokio::test]
async fn test_other_client_cannot_update_or_remove() {
    let app = TestApp::new();
    let ana = app.seed_user("ana@example.com", Role::Client).await;
    let bob = app.seed_user("bob@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&ana)).await.unwrap();
    let id = pet.id.to_string();
    app.cache.clear_ops();

    let patch = UpdatePet { name: Some("Stolen".to_string()), ..Default::default() };
    let err = app.state.pets.update(&id, patch, Role::Client, &bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = app.state.pets.remove(&id, Role::Client, &bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    assert!(app.cache.deleted_keys().is_empty());
    let still = app.state.pets.find_one(&id, Role::Client, &ana.id).await.unwrap();
    assert_eq!(still.name, "Rex");
}

#[tokio::test]
async fn test_admin_can_touch_any_pet() {
    let app = TestApp::new();
    let ana = app.seed_user("ana@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    let pet = app.state.pets.create(rex(), &identity(&ana)).await.unwrap();
    let id = pet.id.to_string();

    let seen = app.state.pets.find_one(&id, Role::Admin, &admin.id).await.unwrap();
    assert_eq!(seen.owner.as_ref().unwrap().email.as_deref(), Some("ana@example.com"));

    let patch = UpdatePet { weight: Some(12.5), ..Default::default() };
    let updated = app.state.pets.update(&id, patch, Role::Admin, &admin.id).await.unwrap();
    assert_eq!(updated.weight, Some(12.5));
    assert_eq!(updated.owner_id(), Some(&ana.id));

    // the owner's collection key is the one invalidated, not the admin's
    assert!(app.cache.deleted_keys().contains(&format!("pets:user:{}", ana.id)));

    app.state.pets.remove(&id, Role::Admin, &admin.id).await.unwrap();
}

#[tokio::test]
async fn test_malformed_id_rejected_before_cache_or_store() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.reset_counters();

    let err = app.state.pets.find_one("not-an-id", Role::Client, &owner.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = app
        .state
        .pets
        .update("123", UpdatePet::default(), Role::Client, &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = app.state.pets.remove("", Role::Admin, &owner.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(app.cache.ops().is_empty());
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn test_missing_pet_is_not_found() {
    let app = TestApp::new();
    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    let missing = petclub::core::models::EntityId::new().to_string();

    let err = app.state.pets.find_one(&missing, Role::Admin, &admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = app
        .state
        .pets
        .update(&missing, UpdatePet::default(), Role::Admin, &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = app.state.pets.remove(&missing, Role::Admin, &admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_payloads_rejected() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;

    let err = app
        .state
        .pets
        .create(CreatePet { name: "  ".to_string(), ..Default::default() }, &identity(&owner))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    let patch = UpdatePet { age: Some(-2.0), ..Default::default() };
    let err = app
        .state
        .pets
        .update(&pet.id.to_string(), patch, Role::Client, &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_failed_store_write_leaves_cache_untouched() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    app.cache.clear_ops();
    app.store.set_fail_writes(true);

    let err = app.state.pets.create(rex(), &identity(&owner)).await.unwrap_err();
    assert!(matches!(err, AppError::Store(_)));

    let patch = UpdatePet { name: Some("Max".to_string()), ..Default::default() };
    let err = app
        .state
        .pets
        .update(&pet.id.to_string(), patch, Role::Client, &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(_)));

    assert!(app.cache.deleted_keys().is_empty());
    assert!(app.cache.prefix_sweeps().is_empty());
    assert!(app.cache.contains(&format!("pets:user:{}", owner.id)).await);
}

#[tokio::test]
async fn test_cached_pet_without_owner_fails_closed() {
    let app = TestApp::new();
    let client = app.seed_user("ana@example.com", Role::Client).await;
    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    let id = petclub::core::models::EntityId::new();
    app.cache
        .put_raw(
            &format!("pet:{}", id),
            &format!(
                r#"{{"id":"{}","name":"Ghost","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}}"#,
                id
            ),
        )
        .await;

    let err = app
        .state
        .pets
        .find_one(&id.to_string(), Role::Client, &client.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let pet: Pet = app
        .state
        .pets
        .find_one(&id.to_string(), Role::Admin, &admin.id)
        .await
        .unwrap();
    assert_eq!(pet.name, "Ghost");
}

#[tokio::test]
async fn test_unavailable_cache_falls_back_to_store() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.cache.set_failing(true);

    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    let listed = app.state.pets.find_all(Role::Client, &owner.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    let found = app
        .state
        .pets
        .find_one(&pet.id.to_string(), Role::Client, &owner.id)
        .await
        .unwrap();
    assert_eq!(found.id, pet.id);
}

#[tokio::test]
async fn test_prefix_sweep_follows_config_and_backend() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    assert_eq!(app.cache.prefix_sweeps(), vec!["pets:".to_string()]);

    let config = Config {
        cache_prefix_invalidation: false,
        ..Config::test_config()
    };
    let app = TestApp::with_config(config);
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    assert!(app.cache.prefix_sweeps().is_empty());
    assert!(app.cache.deleted_keys().contains(&"pets:all".to_string()));

    let app = TestApp::with_parts(
        Config::test_config(),
        Arc::new(RecordingCacheStore::without_prefix_delete()),
    );
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    app.state.pets.create(rex(), &identity(&owner)).await.unwrap();
    assert!(app.cache.prefix_sweeps().is_empty());
    assert!(app
        .cache
        .deleted_keys()
        .contains(&format!("pets:user:{}", owner.id)));
}

#[tokio::test]
async fn test_uppercase_id_resolves_to_same_pet() {
    let app = TestApp::new();
    let owner = app.seed_user("ana@example.com", Role::Client).await;
    let pet = app.state.pets.create(rex(), &identity(&owner)).await.unwrap();

    let upper = pet.id.to_string().to_uppercase();
    let found = app.state.pets.find_one(&upper, Role::Client, &owner.id).await.unwrap();
    assert_eq!(found.id, pet.id);
    assert!(app.cache.contains(&format!("pet:{}", pet.id)).await);
}
