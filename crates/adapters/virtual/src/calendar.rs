//! Virtual calendar serving a fixed list of occurrences.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use climacal_app::ports::EventSource;
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::error::ClimateError;
use climacal_domain::time::Timestamp;

use crate::error::VirtualDeviceError;

/// Calendar backed by an in-memory event list.
pub struct VirtualCalendar {
    events: RwLock<Vec<CalendarEvent>>,
    reachable: AtomicBool,
}

impl Default for VirtualCalendar {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VirtualCalendar {
    #[must_use]
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: RwLock::new(events),
            reachable: AtomicBool::new(true),
        }
    }

    /// Replace every stored event.
    pub async fn replace_events(&self, events: Vec<CalendarEvent>) {
        *self.events.write().await = events;
    }

    pub async fn push_event(&self, event: CalendarEvent) {
        self.events.write().await.push(event);
    }

    /// Simulate an outage: while unreachable every fetch fails.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

impl EventSource for VirtualCalendar {
    async fn fetch_active_events(&self, now: Timestamp) -> Result<Vec<CalendarEvent>, ClimateError> {
        if !self.is_reachable() {
            tracing::warn!("virtual calendar is unreachable");
            return Err(VirtualDeviceError::CalendarUnreachable.into());
        }
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.is_active_at(now))
            .cloned()
            .collect())
    }
}
