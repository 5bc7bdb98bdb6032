//! Notifier port: publish notifications to observers.

use std::future::Future;

use climacal_domain::error::ClimateError;
use climacal_domain::notification::Notification;

/// Publishes notifications to interested subscribers.
pub trait Notifier {
    /// Publish a notification to all current subscribers.
    fn publish(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn publish(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        (**self).publish(notification)
    }
}
