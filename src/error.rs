//! Error types for the storage adapter.
//!
//! Constraint violations reported by Postgres are classified into a
//! [`DatabaseErrorKind`] before any translation decision is made, so the
//! per-operation mapping matches on a typed variant instead of inspecting
//! driver error codes and detail strings.

use thiserror::Error;

/// Errors produced by the storage adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A key row with the same id already exists.
    #[error("duplicate key id")]
    DuplicateKeyId,

    /// A session or key referenced a user id that does not exist.
    #[error("invalid user id")]
    InvalidUserId,

    /// A session operation was invoked, but the adapter was configured
    /// without a session table.
    #[error("no session table configured")]
    SessionsNotConfigured,

    /// A unique-constraint violation the adapter does not translate.
    #[error("unique constraint violated")]
    UniqueViolation { constraint: Option<String> },

    /// A foreign-key violation the adapter does not translate.
    #[error("foreign key constraint violated")]
    ForeignKeyViolation { constraint: Option<String> },

    /// A row was missing a column the record type requires.
    #[error("{entity} row is missing column `{column}`")]
    MissingColumn {
        entity: &'static str,
        column: &'static str,
    },

    /// A required column was present but held an unusable value.
    #[error("{entity} row has a malformed `{column}` column")]
    MalformedColumn {
        entity: &'static str,
        column: &'static str,
    },

    /// A result column used a Postgres type the dynamic decoder does not
    /// support.
    #[error("unsupported column type {ty} for column `{column}`")]
    UnsupportedColumnType { column: String, ty: String },

    /// Any other database error, propagated verbatim.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Constraint-level classification of a database error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    UniqueViolation { constraint: Option<String> },
    ForeignKeyViolation { constraint: Option<String> },
    Other,
}

/// Classify an sqlx error by the constraint class it violated, if any.
///
/// Anything that is not a database-level unique or foreign-key violation
/// (connection failures, decode errors, missing rows) is [`DatabaseErrorKind::Other`].
pub fn classify_db_error(err: &sqlx::Error) -> DatabaseErrorKind {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().map(str::to_owned);
            if db_err.is_unique_violation() {
                DatabaseErrorKind::UniqueViolation { constraint }
            } else if db_err.is_foreign_key_violation() {
                DatabaseErrorKind::ForeignKeyViolation { constraint }
            } else {
                DatabaseErrorKind::Other
            }
        }
        _ => DatabaseErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_classify_as_other() {
        assert_eq!(
            classify_db_error(&sqlx::Error::RowNotFound),
            DatabaseErrorKind::Other
        );
        assert_eq!(
            classify_db_error(&sqlx::Error::PoolClosed),
            DatabaseErrorKind::Other
        );
    }

    #[test]
    fn domain_errors_render_their_fixed_messages() {
        assert_eq!(StoreError::DuplicateKeyId.to_string(), "duplicate key id");
        assert_eq!(StoreError::InvalidUserId.to_string(), "invalid user id");
        assert_eq!(
            StoreError::SessionsNotConfigured.to_string(),
            "no session table configured"
        );
    }
}
