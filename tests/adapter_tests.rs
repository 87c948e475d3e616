//! Black-box tests of the storage contract, driven through the in-memory
//! adapter. The Postgres adapter implements the same traits; anything
//! asserted here about translation and atomicity is the contract both
//! backends share.

use auth_postgres_adapter::{
    Columns, Key, KeyStore, MemoryAdapter, Session, SessionStore, StoreError, User, UserStore,
};
use serde_json::json;

fn changes(entries: &[(&str, serde_json::Value)]) -> Columns {
    let mut columns = Columns::new();
    for (column, value) in entries {
        columns.insert((*column).to_owned(), value.clone());
    }
    columns
}

fn sample_session(id: &str, user_id: &str) -> Session {
    Session::new(id, user_id, 1_700_000_000_000, 1_700_086_400_000)
}

#[tokio::test]
async fn created_user_round_trips() {
    let adapter = MemoryAdapter::new();
    let user = User::new("u1")
        .with_attribute("username", "ash")
        .with_attribute("admin", false);
    adapter.create_user(&user, None).await.unwrap();

    let fetched = adapter.get_user("u1").await.unwrap().unwrap();
    assert_eq!(fetched, user);
}

#[tokio::test]
async fn absent_user_is_none() {
    let adapter = MemoryAdapter::new();
    assert!(adapter.get_user("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn plain_duplicate_user_is_not_translated() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();

    // Without a key there is no key(id) constraint in play, so the
    // violation surfaces as a raw unique violation, not DuplicateKeyId.
    let err = adapter.create_user(&User::new("u1"), None).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
}

#[tokio::test]
async fn user_with_key_creates_both_rows() {
    let adapter = MemoryAdapter::new();
    let user = User::new("u1");
    let key = Key::new("email:a@b.com", "u1").with_attribute("hashed_password", "s2:abc");
    adapter.create_user(&user, Some(&key)).await.unwrap();

    assert!(adapter.get_user("u1").await.unwrap().is_some());
    let fetched = adapter.get_key("email:a@b.com").await.unwrap().unwrap();
    assert_eq!(fetched.user_id, "u1");
    assert_eq!(fetched.attributes["hashed_password"], json!("s2:abc"));
}

#[tokio::test]
async fn failed_key_insert_leaves_no_user_behind() {
    let adapter = MemoryAdapter::new();
    adapter
        .create_user(&User::new("u1"), Some(&Key::new("email:a@b.com", "u1")))
        .await
        .unwrap();

    let err = adapter
        .create_user(&User::new("u2"), Some(&Key::new("email:a@b.com", "u2")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKeyId));

    // The user insert from the failed call must not be visible.
    assert!(adapter.get_user("u2").await.unwrap().is_none());
}

#[tokio::test]
async fn partial_update_touches_only_supplied_columns() {
    let adapter = MemoryAdapter::new();
    let user = User::new("u1")
        .with_attribute("username", "ash")
        .with_attribute("admin", false);
    adapter.create_user(&user, None).await.unwrap();

    adapter
        .update_user("u1", &changes(&[("admin", json!(true))]))
        .await
        .unwrap();

    let fetched = adapter.get_user("u1").await.unwrap().unwrap();
    assert_eq!(fetched.attributes["admin"], json!(true));
    assert_eq!(fetched.attributes["username"], json!("ash"));
}

#[tokio::test]
async fn empty_update_and_absent_target_are_noops() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();

    adapter.update_user("u1", &Columns::new()).await.unwrap();
    adapter
        .update_user("ghost", &changes(&[("admin", json!(true))]))
        .await
        .unwrap();

    let fetched = adapter.get_user("u1").await.unwrap().unwrap();
    assert!(fetched.attributes.is_empty());
}

#[tokio::test]
async fn deletes_are_idempotent() {
    let adapter = MemoryAdapter::new();
    adapter.delete_user("ghost").await.unwrap();
    adapter.delete_key("ghost").await.unwrap();
    adapter.delete_session("ghost").await.unwrap();

    adapter.create_user(&User::new("u1"), None).await.unwrap();
    adapter.delete_user("u1").await.unwrap();
    adapter.delete_user("u1").await.unwrap();
    assert!(adapter.get_user("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn session_requires_existing_user() {
    let adapter = MemoryAdapter::new();
    let err = adapter
        .create_session(&sample_session("s1", "missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidUserId));
}

#[tokio::test]
async fn sessions_round_trip_and_list_by_user() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();
    adapter.create_user(&User::new("u2"), None).await.unwrap();

    let session = sample_session("s1", "u1").with_attribute("country", "NZ");
    adapter.create_session(&session).await.unwrap();
    adapter
        .create_session(&sample_session("s2", "u1"))
        .await
        .unwrap();
    adapter
        .create_session(&sample_session("s3", "u2"))
        .await
        .unwrap();

    let fetched = adapter.get_session("s1").await.unwrap().unwrap();
    assert_eq!(fetched, session);

    let mut ids: Vec<String> = adapter
        .get_sessions_by_user_id("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    ids.sort();
    assert_eq!(ids, ["s1", "s2"]);
}

#[tokio::test]
async fn update_session_moves_expiries() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();
    adapter
        .create_session(&sample_session("s1", "u1"))
        .await
        .unwrap();

    adapter
        .update_session("s1", &changes(&[("idle_expires", json!(1_800_000_000_000_i64))]))
        .await
        .unwrap();

    let fetched = adapter.get_session("s1").await.unwrap().unwrap();
    assert_eq!(fetched.idle_expires, 1_800_000_000_000);
    assert_eq!(fetched.active_expires, 1_700_000_000_000);
}

#[tokio::test]
async fn delete_sessions_by_user_id_spares_other_users() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();
    adapter.create_user(&User::new("u2"), None).await.unwrap();
    adapter
        .create_session(&sample_session("s1", "u1"))
        .await
        .unwrap();
    adapter
        .create_session(&sample_session("s2", "u2"))
        .await
        .unwrap();

    adapter.delete_sessions_by_user_id("u1").await.unwrap();
    assert!(adapter.get_session("s1").await.unwrap().is_none());
    assert!(adapter.get_session("s2").await.unwrap().is_some());
}

#[tokio::test]
async fn session_and_user_join() {
    let adapter = MemoryAdapter::new();
    assert!(adapter
        .get_session_and_user("missing")
        .await
        .unwrap()
        .is_none());

    let user = User::new("u1").with_attribute("username", "ash");
    adapter.create_user(&user, None).await.unwrap();
    adapter
        .create_session(&sample_session("s1", "u1"))
        .await
        .unwrap();

    let (session, joined_user) = adapter
        .get_session_and_user("s1")
        .await
        .unwrap()
        .expect("session and user should both exist");
    assert_eq!(session.id, "s1");
    assert_eq!(joined_user.id, session.user_id);
    assert_eq!(joined_user, user);
}

#[tokio::test]
async fn session_operations_fail_fast_without_session_table() {
    let adapter = MemoryAdapter::without_sessions();
    adapter.create_user(&User::new("u1"), None).await.unwrap();

    let unconfigured = |err: StoreError| matches!(err, StoreError::SessionsNotConfigured);

    assert!(unconfigured(adapter.get_session("s1").await.unwrap_err()));
    assert!(unconfigured(
        adapter.get_sessions_by_user_id("u1").await.unwrap_err()
    ));
    assert!(unconfigured(
        adapter.get_session_and_user("s1").await.unwrap_err()
    ));
    assert!(unconfigured(
        adapter
            .create_session(&sample_session("s1", "u1"))
            .await
            .unwrap_err()
    ));
    assert!(unconfigured(
        adapter
            .update_session("s1", &changes(&[("idle_expires", json!(1_i64))]))
            .await
            .unwrap_err()
    ));
    assert!(unconfigured(adapter.delete_session("s1").await.unwrap_err()));
    assert!(unconfigured(
        adapter.delete_sessions_by_user_id("u1").await.unwrap_err()
    ));

    // Non-session operations stay available.
    assert!(adapter.get_user("u1").await.unwrap().is_some());
}

#[tokio::test]
async fn keys_round_trip_and_list_by_user() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();

    adapter
        .create_key(&Key::new("email:a@b.com", "u1"))
        .await
        .unwrap();
    adapter
        .create_key(&Key::new("github:1234", "u1"))
        .await
        .unwrap();

    let mut ids: Vec<String> = adapter
        .get_keys_by_user_id("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.id)
        .collect();
    ids.sort();
    assert_eq!(ids, ["email:a@b.com", "github:1234"]);

    adapter.delete_keys_by_user_id("u1").await.unwrap();
    assert!(adapter.get_key("email:a@b.com").await.unwrap().is_none());
}

#[tokio::test]
async fn update_key_changes_supplied_columns() {
    let adapter = MemoryAdapter::new();
    adapter.create_user(&User::new("u1"), None).await.unwrap();
    adapter
        .create_key(&Key::new("email:a@b.com", "u1").with_attribute("hashed_password", "s2:old"))
        .await
        .unwrap();

    adapter
        .update_key(
            "email:a@b.com",
            &changes(&[("hashed_password", json!("s2:new"))]),
        )
        .await
        .unwrap();

    let fetched = adapter.get_key("email:a@b.com").await.unwrap().unwrap();
    assert_eq!(fetched.attributes["hashed_password"], json!("s2:new"));
    assert_eq!(fetched.user_id, "u1");
}

#[tokio::test]
async fn provider_key_scenario() {
    let adapter = MemoryAdapter::new();

    adapter
        .create_user(&User::new("u1"), Some(&Key::new("email:a@b.com", "u1")))
        .await
        .unwrap();
    assert!(adapter.get_user("u1").await.unwrap().is_some());
    assert!(adapter.get_key("email:a@b.com").await.unwrap().is_some());

    let err = adapter
        .create_key(&Key::new("email:a@b.com", "u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKeyId));

    let err = adapter
        .create_key(&Key::new("email:b@c.com", "missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidUserId));
}
