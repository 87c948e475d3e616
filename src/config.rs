//! Adapter configuration: table names and connection-pool tuning.

use std::time::Duration;

/// Names of the logical tables the adapter operates on.
///
/// The session table is optional. When it is absent every session
/// operation fails fast with
/// [`SessionsNotConfigured`](crate::StoreError::SessionsNotConfigured)
/// before any I/O happens; the check is resolved once at adapter
/// construction, not re-derived per call.
///
/// Names may be schema-qualified (`public.auth_user`). They are
/// identifier-escaped before ever reaching SQL text.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub user: String,
    pub session: Option<String>,
    pub key: String,
}

impl TableNames {
    /// Table set with session support.
    pub fn new(
        user: impl Into<String>,
        session: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            session: Some(session.into()),
            key: key.into(),
        }
    }

    /// Table set without a session table.
    pub fn without_sessions(user: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            session: None,
            key: key.into(),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::new("auth_user", "auth_session", "auth_key")
    }
}

/// Connection-pool tuning passed through to sqlx.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}
