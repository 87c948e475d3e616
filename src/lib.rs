//! # auth-postgres-adapter
//!
//! Storage adapter that persists the users, sessions, and keys of an
//! authentication library in PostgreSQL. The abstract operation set lives
//! in [`adapters::traits`]; [`PostgresAdapter`] implements it over an sqlx
//! connection pool, and [`MemoryAdapter`] is an in-process stand-in with
//! the same constraint behavior for tests.
//!
//! Database constraint violations surface as two domain errors: a
//! duplicate key id, and a reference to an unknown user id. Everything
//! else propagates verbatim. See [`StoreError`].
//!
//! ```no_run
//! use auth_postgres_adapter::{PostgresAdapter, TableNames, User, UserStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter =
//!     PostgresAdapter::connect("postgres://localhost/auth", TableNames::default()).await?;
//! adapter
//!     .create_user(&User::new("u1").with_attribute("username", "ash"), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod schema;
pub mod sql;

pub use adapters::memory::MemoryAdapter;
pub use adapters::postgres::PostgresAdapter;
pub use adapters::traits::{Adapter, KeyStore, SessionStore, UserStore};
pub use config::{PoolConfig, TableNames};
pub use error::{classify_db_error, DatabaseErrorKind, StoreError, StoreResult};
pub use schema::{Columns, Key, Session, User};
