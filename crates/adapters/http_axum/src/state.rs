//! Shared application state for axum handlers.

use std::sync::Arc;

use climacal_app::coordinator::Coordinator;
use climacal_app::notification_bus::InProcessNotificationBus;

/// Coordinator type served over HTTP: notifications always go through the
/// in-process bus so they can be streamed.
pub type SharedCoordinator<E, D, S> = Coordinator<E, D, S, Arc<InProcessNotificationBus>>;

/// Application state shared across all axum handlers.
///
/// `Clone` is implemented manually so the port types do not need to be
/// `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<E, D, S> {
    pub coordinator: Arc<SharedCoordinator<E, D, S>>,
    pub notifications: Arc<InProcessNotificationBus>,
}

impl<E, D, S> Clone for AppState<E, D, S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            notifications: Arc::clone(&self.notifications),
        }
    }
}

impl<E, D, S> AppState<E, D, S> {
    /// Build the state from a coordinator already shared with the poll loop.
    pub fn new(
        coordinator: Arc<SharedCoordinator<E, D, S>>,
        notifications: Arc<InProcessNotificationBus>,
    ) -> Self {
        Self {
            coordinator,
            notifications,
        }
    }
}
