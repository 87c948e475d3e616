//! In-memory storage adapter.
//!
//! Simulates the primary-key and foreign-key constraints the database
//! enforces for the Postgres adapter, so the error contract can be
//! exercised in tests without a running server. Constraint checks run
//! before any mutation, keeping the user+key insert atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::adapters::traits::{KeyStore, SessionStore, UserStore};
use crate::error::{StoreError, StoreResult};
use crate::schema::{Columns, Key, Session, User};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
    keys: HashMap<String, Key>,
}

/// In-memory storage adapter.
#[derive(Debug)]
pub struct MemoryAdapter {
    state: Mutex<MemoryState>,
    sessions_enabled: bool,
}

impl MemoryAdapter {
    /// Adapter with session support.
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            sessions_enabled: true,
        }
    }

    /// Adapter configured without a session table.
    pub fn without_sessions() -> Self {
        Self {
            state: Mutex::default(),
            sessions_enabled: false,
        }
    }

    fn check_sessions(&self) -> StoreResult<()> {
        if self.sessions_enabled {
            Ok(())
        } else {
            Err(StoreError::SessionsNotConfigured)
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn merged(mut columns: Columns, changes: &Columns) -> Columns {
    for (column, value) in changes {
        columns.insert(column.clone(), value.clone());
    }
    columns
}

#[async_trait]
impl UserStore for MemoryAdapter {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(user_id).cloned())
    }

    async fn create_user(&self, user: &User, key: Option<&Key>) -> StoreResult<()> {
        let mut state = self.lock();
        if state.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("user_pkey".to_owned()),
            });
        }
        if let Some(key) = key {
            if state.keys.contains_key(&key.id) {
                return Err(StoreError::DuplicateKeyId);
            }
            if key.user_id != user.id && !state.users.contains_key(&key.user_id) {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: Some("key_user_id_fkey".to_owned()),
                });
            }
            state.keys.insert(key.id.clone(), key.clone());
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user_id: &str, changes: &Columns) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut state = self.lock();
        let current = match state.users.get(user_id) {
            Some(user) => user.clone(),
            None => return Ok(()),
        };
        let updated = User::from_columns(merged(current.to_columns(), changes))?;
        state.users.remove(user_id);
        state.users.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> StoreResult<()> {
        self.lock().users.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryAdapter {
    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        self.check_sessions()?;
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn get_sessions_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Session>> {
        self.check_sessions()?;
        Ok(self
            .lock()
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_session_and_user(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, User)>> {
        self.check_sessions()?;
        let state = self.lock();
        let session = match state.sessions.get(session_id) {
            Some(session) => session.clone(),
            None => return Ok(None),
        };
        let user = match state.users.get(&session.user_id) {
            Some(user) => user.clone(),
            None => return Ok(None),
        };
        Ok(Some((session, user)))
    }

    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        self.check_sessions()?;
        let mut state = self.lock();
        if !state.users.contains_key(&session.user_id) {
            return Err(StoreError::InvalidUserId);
        }
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("session_pkey".to_owned()),
            });
        }
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session_id: &str, changes: &Columns) -> StoreResult<()> {
        self.check_sessions()?;
        if changes.is_empty() {
            return Ok(());
        }
        let mut state = self.lock();
        let current = match state.sessions.get(session_id) {
            Some(session) => session.clone(),
            None => return Ok(()),
        };
        let updated = Session::from_columns(merged(current.to_columns(), changes))?;
        state.sessions.remove(session_id);
        state.sessions.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.check_sessions()?;
        self.lock().sessions.remove(session_id);
        Ok(())
    }

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> StoreResult<()> {
        self.check_sessions()?;
        self.lock()
            .sessions
            .retain(|_, session| session.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryAdapter {
    async fn get_key(&self, key_id: &str) -> StoreResult<Option<Key>> {
        Ok(self.lock().keys.get(key_id).cloned())
    }

    async fn get_keys_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Key>> {
        Ok(self
            .lock()
            .keys
            .values()
            .filter(|key| key.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_key(&self, key: &Key) -> StoreResult<()> {
        let mut state = self.lock();
        if state.keys.contains_key(&key.id) {
            return Err(StoreError::DuplicateKeyId);
        }
        if !state.users.contains_key(&key.user_id) {
            return Err(StoreError::InvalidUserId);
        }
        state.keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn update_key(&self, key_id: &str, changes: &Columns) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut state = self.lock();
        let current = match state.keys.get(key_id) {
            Some(key) => key.clone(),
            None => return Ok(()),
        };
        let updated = Key::from_columns(merged(current.to_columns(), changes))?;
        state.keys.remove(key_id);
        state.keys.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn delete_key(&self, key_id: &str) -> StoreResult<()> {
        self.lock().keys.remove(key_id);
        Ok(())
    }

    async fn delete_keys_by_user_id(&self, user_id: &str) -> StoreResult<()> {
        self.lock().keys.retain(|_, key| key.user_id != user_id);
        Ok(())
    }
}
