//! Event source port: where calendar events come from.

use std::future::Future;

use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::error::ClimateError;
use climacal_domain::time::Timestamp;

/// Supplies already-expanded calendar occurrences.
pub trait EventSource {
    /// Return the events active at `now`, across every watched calendar.
    ///
    /// A failure is fatal for the cycle and should be reported as
    /// [`ClimateError::EventSource`].
    fn fetch_active_events(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>, ClimateError>> + Send;
}

impl<T: EventSource + Send + Sync> EventSource for std::sync::Arc<T> {
    fn fetch_active_events(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>, ClimateError>> + Send {
        (**self).fetch_active_events(now)
    }
}
