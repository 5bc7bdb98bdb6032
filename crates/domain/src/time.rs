//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// UTC timestamp used for event bounds, flag creation, notifications, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Calendar date of `ts` as observed in `tz`.
#[must_use]
pub fn local_date(ts: Timestamp, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}
