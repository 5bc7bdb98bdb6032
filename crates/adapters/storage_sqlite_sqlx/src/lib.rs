//! # climacal-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`FlagStore`](climacal_app::ports::FlagStore) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! ## Dependency rule
//! Depends on `climacal-app` (for port traits) and `climacal-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod flag_store;
mod pool;

pub use error::StorageError;
pub use flag_store::SqliteFlagStore;
pub use pool::{Config, Database};
