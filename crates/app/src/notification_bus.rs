//! In-process notification bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use climacal_domain::error::ClimateError;
use climacal_domain::notification::Notification;

use crate::ports::Notifier;

/// In-process notification bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the notification is simply dropped).
pub struct InProcessNotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl InProcessNotificationBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Notifier for InProcessNotificationBus {
    fn publish(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        // Only fails without receivers.
        let _ = self.sender.send(notification);
        async { Ok(()) }
    }
}
