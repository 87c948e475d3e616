pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryAdapter;
pub use postgres::PostgresAdapter;
pub use traits::{Adapter, KeyStore, SessionStore, UserStore};
