//! `SQLite` implementation of [`FlagStore`].

use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use climacal_app::ports::FlagStore;
use climacal_domain::error::ClimateError;
use climacal_domain::flag::{FlagKind, OverrideFlag};
use climacal_domain::id::{DeviceId, SlotId};

use crate::error::StorageError;

/// The flag is global; the table keeps a single row under this scope.
const GLOBAL_SCOPE: &str = "global";

const UPSERT: &str = r"
    INSERT INTO override_flag (scope, kind, target_slot_id, set_at, baseline)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (scope) DO UPDATE SET
        kind = excluded.kind,
        target_slot_id = excluded.target_slot_id,
        set_at = excluded.set_at,
        baseline = excluded.baseline
";
const SELECT: &str = "SELECT * FROM override_flag WHERE scope = ?";
const DELETE: &str = "DELETE FROM override_flag WHERE scope = ?";

struct Wrapper(OverrideFlag);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let target_slot_id: Option<String> = row.try_get("target_slot_id")?;
        let set_at: String = row.try_get("set_at")?;
        let baseline: String = row.try_get("baseline")?;

        let kind = FlagKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let target_slot_id = target_slot_id
            .map(SlotId::new)
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let set_at = chrono::DateTime::parse_from_rfc3339(&set_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let baseline: BTreeMap<DeviceId, SlotId> = serde_json::from_str(&baseline)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        OverrideFlag::new(kind, target_slot_id, set_at, baseline)
            .map(Self)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))
    }
}

/// `SQLite`-backed flag store.
pub struct SqliteFlagStore {
    pool: SqlitePool,
}

impl SqliteFlagStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl FlagStore for SqliteFlagStore {
    fn load(&self) -> impl Future<Output = Result<Option<OverrideFlag>, ClimateError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT)
                .bind(GLOBAL_SCOPE)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn save(
        &self,
        flag: Option<OverrideFlag>,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        let pool = self.pool.clone();
        async move {
            match flag {
                Some(flag) => {
                    let baseline = serde_json::to_string(&flag.baseline).map_err(StorageError::from)?;
                    sqlx::query(UPSERT)
                        .bind(GLOBAL_SCOPE)
                        .bind(flag.kind.as_str())
                        .bind(flag.target_slot_id.as_ref().map(SlotId::as_str))
                        .bind(flag.set_at.to_rfc3339())
                        .bind(baseline)
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                }
                None => {
                    sqlx::query(DELETE)
                        .bind(GLOBAL_SCOPE)
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                }
            }
            Ok(())
        }
    }
}
