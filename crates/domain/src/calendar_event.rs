//! Calendar event: a transient occurrence fetched on every poll cycle.
//!
//! Recurrence expansion belongs to the calendar source; the core only sees
//! concrete occurrences with a start and an end.

use serde::{Deserialize, Serialize};

use crate::id::CalendarId;
use crate::time::Timestamp;

/// A single calendar occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub calendar_id: CalendarId,
    pub summary: String,
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CalendarEvent {
    /// Create an event without description.
    #[must_use]
    pub fn new(
        calendar_id: CalendarId,
        summary: impl Into<String>,
        start: Timestamp,
        end: Timestamp,
    ) -> Self {
        Self {
            calendar_id,
            summary: summary.into(),
            start,
            end,
            description: None,
        }
    }

    /// Whether `now` falls in the half-open interval `[start, end)`.
    #[must_use]
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.start <= now && now < self.end
    }
}
