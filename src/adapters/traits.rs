use async_trait::async_trait;

use crate::error::StoreResult;
use crate::schema::{Columns, Key, Session, User};

/// User persistence operations.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Single-row lookup by id; `None` if absent.
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;

    /// Insert a user row. With `key`, the user and the key are inserted
    /// atomically in one transaction; a duplicate key id surfaces as
    /// [`DuplicateKeyId`](crate::StoreError::DuplicateKeyId).
    async fn create_user(&self, user: &User, key: Option<&Key>) -> StoreResult<()>;

    /// Update only the supplied columns. An empty change set is a no-op,
    /// and updating an absent id succeeds without effect.
    async fn update_user(&self, user_id: &str, changes: &Columns) -> StoreResult<()>;

    /// Delete by id. Deleting an absent id succeeds.
    async fn delete_user(&self, user_id: &str) -> StoreResult<()>;
}

/// Session persistence operations.
///
/// Every operation requires a configured session table and fails with
/// [`SessionsNotConfigured`](crate::StoreError::SessionsNotConfigured)
/// otherwise, before any I/O.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>>;

    async fn get_sessions_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Session>>;

    /// Fetch a session and its owning user together. The two lookups run
    /// concurrently with no ordering guarantee between them; `None` unless
    /// both rows exist.
    async fn get_session_and_user(&self, session_id: &str)
        -> StoreResult<Option<(Session, User)>>;

    /// Insert a session row. An unknown `user_id` surfaces as
    /// [`InvalidUserId`](crate::StoreError::InvalidUserId).
    async fn create_session(&self, session: &Session) -> StoreResult<()>;

    async fn update_session(&self, session_id: &str, changes: &Columns) -> StoreResult<()>;

    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> StoreResult<()>;
}

/// Key (credential) persistence operations.
#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    async fn get_key(&self, key_id: &str) -> StoreResult<Option<Key>>;

    async fn get_keys_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Key>>;

    /// Insert a key row. A duplicate id surfaces as
    /// [`DuplicateKeyId`](crate::StoreError::DuplicateKeyId); an unknown
    /// `user_id` as [`InvalidUserId`](crate::StoreError::InvalidUserId).
    async fn create_key(&self, key: &Key) -> StoreResult<()>;

    async fn update_key(&self, key_id: &str, changes: &Columns) -> StoreResult<()>;

    async fn delete_key(&self, key_id: &str) -> StoreResult<()>;

    async fn delete_keys_by_user_id(&self, user_id: &str) -> StoreResult<()>;
}

/// Complete storage adapter.
///
/// Combines the entity-specific operation traits. Any type implementing
/// all three automatically implements `Adapter` via the blanket impl; use
/// the sub-traits directly when only a subset of operations is needed.
pub trait Adapter: UserStore + SessionStore + KeyStore {}

impl<T> Adapter for T where T: UserStore + SessionStore + KeyStore {}
