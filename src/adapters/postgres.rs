//! PostgreSQL storage adapter via sqlx.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::adapters::traits::{KeyStore, SessionStore, UserStore};
use crate::config::{PoolConfig, TableNames};
use crate::error::{classify_db_error, DatabaseErrorKind, StoreError, StoreResult};
use crate::schema::{Columns, Key, Session, User};
use crate::sql::{bind_value, escape_ident, insert_sql, row_to_columns, update_by_id_sql};

/// Escaped table names, resolved once at construction.
#[derive(Debug, Clone)]
struct EscapedTables {
    user: String,
    session: Option<String>,
    key: String,
}

impl EscapedTables {
    fn new(tables: &TableNames) -> Self {
        Self {
            user: escape_ident(&tables.user),
            session: tables.session.as_deref().map(escape_ident),
            key: escape_ident(&tables.key),
        }
    }
}

/// PostgreSQL storage adapter.
///
/// Each operation issues independently atomic single statements against
/// the pool; the one multi-statement operation (`create_user` with a key)
/// runs in its own transaction on a dedicated pooled connection. The
/// adapter holds no state between calls beyond the pool itself.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
    tables: EscapedTables,
}

impl PostgresAdapter {
    /// Connect with default pool settings.
    pub async fn connect(database_url: &str, tables: TableNames) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::from_pool(pool, tables))
    }

    /// Connect with explicit pool tuning.
    pub async fn connect_with(
        database_url: &str,
        tables: TableNames,
        config: PoolConfig,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool, tables))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, tables: TableNames) -> Self {
        tracing::debug!(
            user = %tables.user,
            session = ?tables.session,
            key = %tables.key,
            "postgres adapter configured"
        );
        Self {
            pool,
            tables: EscapedTables::new(&tables),
        }
    }

    pub async fn test_connection(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn session_table(&self) -> StoreResult<&str> {
        self.tables
            .session
            .as_deref()
            .ok_or(StoreError::SessionsNotConfigured)
    }

    async fn fetch_by_id(&self, table: &str, id: &str) -> StoreResult<Option<Columns>> {
        let sql = format!("SELECT * FROM {table} WHERE \"id\" = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_columns).transpose()
    }

    async fn fetch_by_user_id(&self, table: &str, user_id: &str) -> StoreResult<Vec<Columns>> {
        let sql = format!("SELECT * FROM {table} WHERE \"user_id\" = $1");
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_columns).collect()
    }

    async fn update_by_id(&self, table: &str, id: &str, changes: &Columns) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = changes.keys().map(String::as_str).collect();
        let sql = update_by_id_sql(table, &names, "id");
        let mut query = sqlx::query(&sql);
        for value in changes.values() {
            query = bind_value(query, value);
        }
        query.bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_where(&self, table: &str, column: &str, value: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {table} WHERE {} = $1", escape_ident(column));
        sqlx::query(&sql).bind(value).execute(&self.pool).await?;
        Ok(())
    }
}

/// Insert a column map into `table` (already escaped) on any executor.
async fn insert_into<'e, E>(executor: E, table: &str, columns: &Columns) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let names: Vec<&str> = columns.keys().map(String::as_str).collect();
    let sql = insert_sql(table, &names);
    let mut query = sqlx::query(&sql);
    for value in columns.values() {
        query = bind_value(query, value);
    }
    query.execute(executor).await?;
    Ok(())
}

async fn insert_user_and_key(
    tx: &mut Transaction<'_, Postgres>,
    tables: &EscapedTables,
    user_columns: &Columns,
    key_columns: &Columns,
) -> Result<(), sqlx::Error> {
    insert_into(&mut **tx, &tables.user, user_columns).await?;
    insert_into(&mut **tx, &tables.key, key_columns).await
}

#[async_trait]
impl UserStore for PostgresAdapter {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.fetch_by_id(&self.tables.user, user_id)
            .await?
            .map(User::from_columns)
            .transpose()
    }

    async fn create_user(&self, user: &User, key: Option<&Key>) -> StoreResult<()> {
        let user_columns = user.to_columns();
        let key = match key {
            Some(key) => key,
            None => {
                // No key row, no key(id) constraint in play: nothing to
                // translate, the raw error propagates.
                insert_into(&self.pool, &self.tables.user, &user_columns).await?;
                return Ok(());
            }
        };

        let key_columns = key.to_columns();
        let mut tx = self.pool.begin().await?;
        match insert_user_and_key(&mut tx, &self.tables, &user_columns, &key_columns).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        "rollback after failed user+key insert also failed"
                    );
                }
                match classify_db_error(&err) {
                    DatabaseErrorKind::UniqueViolation { .. } => Err(StoreError::DuplicateKeyId),
                    _ => Err(StoreError::Database(err)),
                }
            }
        }
    }

    async fn update_user(&self, user_id: &str, changes: &Columns) -> StoreResult<()> {
        self.update_by_id(&self.tables.user, user_id, changes).await
    }

    async fn delete_user(&self, user_id: &str) -> StoreResult<()> {
        self.delete_where(&self.tables.user, "id", user_id).await
    }
}

#[async_trait]
impl SessionStore for PostgresAdapter {
    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let table = self.session_table()?;
        self.fetch_by_id(table, session_id)
            .await?
            .map(Session::from_columns)
            .transpose()
    }

    async fn get_sessions_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Session>> {
        let table = self.session_table()?;
        self.fetch_by_user_id(table, user_id)
            .await?
            .into_iter()
            .map(Session::from_columns)
            .collect()
    }

    async fn get_session_and_user(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, User)>> {
        let session_table = self.session_table()?;
        let join_sql = format!(
            "SELECT {user}.*, {session}.\"id\" AS __session_id FROM {user} \
             INNER JOIN {session} ON {user}.\"id\" = {session}.\"user_id\" \
             WHERE {session}.\"id\" = $1",
            user = self.tables.user,
            session = session_table,
        );
        let session_lookup = self.fetch_by_id(session_table, session_id);
        let user_lookup = async {
            let row = sqlx::query(&join_sql)
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(row_to_columns).transpose()
        };

        let (session_row, user_row) = tokio::try_join!(session_lookup, user_lookup)?;
        match (session_row, user_row) {
            (Some(session_row), Some(mut user_row)) => {
                user_row.remove("__session_id");
                let session = Session::from_columns(session_row)?;
                let user = User::from_columns(user_row)?;
                Ok(Some((session, user)))
            }
            _ => Ok(None),
        }
    }

    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let table = self.session_table()?;
        insert_into(&self.pool, table, &session.to_columns())
            .await
            .map_err(|err| match classify_db_error(&err) {
                DatabaseErrorKind::ForeignKeyViolation { .. } => StoreError::InvalidUserId,
                _ => StoreError::Database(err),
            })
    }

    async fn update_session(&self, session_id: &str, changes: &Columns) -> StoreResult<()> {
        let table = self.session_table()?;
        self.update_by_id(table, session_id, changes).await
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let table = self.session_table()?;
        self.delete_where(table, "id", session_id).await
    }

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> StoreResult<()> {
        let table = self.session_table()?;
        self.delete_where(table, "user_id", user_id).await
    }
}

#[async_trait]
impl KeyStore for PostgresAdapter {
    async fn get_key(&self, key_id: &str) -> StoreResult<Option<Key>> {
        self.fetch_by_id(&self.tables.key, key_id)
            .await?
            .map(Key::from_columns)
            .transpose()
    }

    async fn get_keys_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Key>> {
        self.fetch_by_user_id(&self.tables.key, user_id)
            .await?
            .into_iter()
            .map(Key::from_columns)
            .collect()
    }

    async fn create_key(&self, key: &Key) -> StoreResult<()> {
        insert_into(&self.pool, &self.tables.key, &key.to_columns())
            .await
            .map_err(|err| match classify_db_error(&err) {
                DatabaseErrorKind::UniqueViolation { .. } => StoreError::DuplicateKeyId,
                DatabaseErrorKind::ForeignKeyViolation { .. } => StoreError::InvalidUserId,
                DatabaseErrorKind::Other => StoreError::Database(err),
            })
    }

    async fn update_key(&self, key_id: &str, changes: &Columns) -> StoreResult<()> {
        self.update_by_id(&self.tables.key, key_id, changes).await
    }

    async fn delete_key(&self, key_id: &str) -> StoreResult<()> {
        self.delete_where(&self.tables.key, "id", key_id).await
    }

    async fn delete_keys_by_user_id(&self, user_id: &str) -> StoreResult<()> {
        self.delete_where(&self.tables.key, "user_id", user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_escape_once_at_construction() {
        let tables = EscapedTables::new(&TableNames::new("public.auth_user", "s", "k"));
        assert_eq!(tables.user, "\"public\".\"auth_user\"");
        assert_eq!(tables.session.as_deref(), Some("\"s\""));
        assert_eq!(tables.key, "\"k\"");
    }

    #[test]
    fn missing_session_table_is_a_config_error() {
        let tables = EscapedTables::new(&TableNames::without_sessions("u", "k"));
        assert!(tables.session.is_none());
    }
}
