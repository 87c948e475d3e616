//! Record types for the three logical tables.
//!
//! Rows travel as column → value maps. The record types lift out the
//! columns the adapter itself interprets (ids, the owning user id, the
//! session expiry markers) and keep every other column in an opaque
//! attributes bag, untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// A database row as a column → value map.
pub type Columns = Map<String, Value>;

/// A user row: caller-supplied unique `id` plus opaque attribute columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Columns,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Columns::new(),
        }
    }

    /// Add an attribute column (builder style).
    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Rebuild a user from a raw row.
    pub fn from_columns(mut columns: Columns) -> StoreResult<Self> {
        let id = take_string(&mut columns, "user", "id")?;
        Ok(Self {
            id,
            attributes: columns,
        })
    }

    /// Flatten into a column map for insertion.
    pub fn to_columns(&self) -> Columns {
        let mut columns = self.attributes.clone();
        columns.insert("id".to_owned(), Value::String(self.id.clone()));
        columns
    }
}

/// A session row.
///
/// `active_expires` and `idle_expires` are epoch milliseconds and are the
/// only columns the adapter interprets; the rest of the row is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub active_expires: i64,
    pub idle_expires: i64,
    #[serde(flatten)]
    pub attributes: Columns,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        active_expires: i64,
        idle_expires: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            active_expires,
            idle_expires,
            attributes: Columns::new(),
        }
    }

    /// Add an attribute column (builder style).
    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Normalize a raw row into a session record.
    ///
    /// BIGINT expiries may arrive as SQL integers or as numeric strings,
    /// depending on how the row traveled; both forms are accepted.
    pub fn from_columns(mut columns: Columns) -> StoreResult<Self> {
        let id = take_string(&mut columns, "session", "id")?;
        let user_id = take_string(&mut columns, "session", "user_id")?;
        let active_expires = take_millis(&mut columns, "active_expires")?;
        let idle_expires = take_millis(&mut columns, "idle_expires")?;
        Ok(Self {
            id,
            user_id,
            active_expires,
            idle_expires,
            attributes: columns,
        })
    }

    /// Flatten into a column map for insertion.
    pub fn to_columns(&self) -> Columns {
        let mut columns = self.attributes.clone();
        columns.insert("id".to_owned(), Value::String(self.id.clone()));
        columns.insert("user_id".to_owned(), Value::String(self.user_id.clone()));
        columns.insert("active_expires".to_owned(), self.active_expires.into());
        columns.insert("idle_expires".to_owned(), self.idle_expires.into());
        columns
    }

    /// Instant at which the active period ends.
    pub fn active_expires_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.active_expires)
    }

    /// Instant at which the idle period ends.
    pub fn idle_expires_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.idle_expires)
    }

    /// Whether the session is past its idle deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.idle_expires_at() < now
    }
}

/// A key (credential) row.
///
/// By the calling library's convention the id has the form
/// `<provider>:<provider-id>`; the adapter treats it as an opaque unique
/// string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub attributes: Columns,
}

impl Key {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            attributes: Columns::new(),
        }
    }

    /// Add an attribute column (builder style).
    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Rebuild a key from a raw row.
    pub fn from_columns(mut columns: Columns) -> StoreResult<Self> {
        let id = take_string(&mut columns, "key", "id")?;
        let user_id = take_string(&mut columns, "key", "user_id")?;
        Ok(Self {
            id,
            user_id,
            attributes: columns,
        })
    }

    /// Flatten into a column map for insertion.
    pub fn to_columns(&self) -> Columns {
        let mut columns = self.attributes.clone();
        columns.insert("id".to_owned(), Value::String(self.id.clone()));
        columns.insert("user_id".to_owned(), Value::String(self.user_id.clone()));
        columns
    }
}

fn take_string(
    columns: &mut Columns,
    entity: &'static str,
    column: &'static str,
) -> StoreResult<String> {
    match columns.remove(column) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(StoreError::MalformedColumn { entity, column }),
        None => Err(StoreError::MissingColumn { entity, column }),
    }
}

fn take_millis(columns: &mut Columns, column: &'static str) -> StoreResult<i64> {
    let entity = "session";
    match columns.remove(column) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or(StoreError::MalformedColumn { entity, column }),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| StoreError::MalformedColumn { entity, column }),
        Some(_) => Err(StoreError::MalformedColumn { entity, column }),
        None => Err(StoreError::MissingColumn { entity, column }),
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
