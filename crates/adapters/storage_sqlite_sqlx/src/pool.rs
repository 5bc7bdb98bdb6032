//! Database handle for the override flag.
//!
//! The schema is a single `override_flag` table keyed by `scope`. Only the
//! `global` scope is ever written, so the table holds zero or one row:
//!
//! | column           | content                                      |
//! |------------------|----------------------------------------------|
//! | `scope`          | always `global`                              |
//! | `kind`           | `skip_today`, `skip_until_next_slot`, `force_slot` |
//! | `target_slot_id` | forced slot, `NULL` for skip flags           |
//! | `set_at`         | RFC 3339 instant the flag was set            |
//! | `baseline`       | JSON map device id to slot id at set time    |
//!
//! Migrations are embedded and run when the database opens.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StorageError;
use crate::flag_store::SqliteFlagStore;

/// Where the flag lives.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:climacal.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Whether every connection would get its own private database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Open the database, creating the file if missing, and migrate it.
    ///
    /// In-memory databases are pinned to one connection so the migrated
    /// schema and the stored flag are visible to every store built from
    /// the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new();
        if self.is_in_memory() {
            pool_options = pool_options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url = %self.database_url, "flag database ready");
        Ok(Database { pool })
    }
}

/// Open flag database.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A [`SqliteFlagStore`] sharing this database's pool.
    #[must_use]
    pub fn flag_store(&self) -> SqliteFlagStore {
        SqliteFlagStore::new(self.pool.clone())
    }
}
