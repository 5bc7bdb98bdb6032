//! Device control port: pushes configuration to climate devices.

use std::future::Future;

use climacal_domain::error::ClimateError;
use climacal_domain::id::DeviceId;
use climacal_domain::payload::ClimatePayload;

/// Sends a payload to a single device.
pub trait DeviceController {
    /// Apply `payload` to `device_id`.
    ///
    /// Failures are recoverable and reported as [`ClimateError::Transport`];
    /// the executor retries them.
    fn send_configuration(
        &self,
        device_id: &DeviceId,
        payload: &ClimatePayload,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send;
}

impl<T: DeviceController + Send + Sync> DeviceController for std::sync::Arc<T> {
    fn send_configuration(
        &self,
        device_id: &DeviceId,
        payload: &ClimatePayload,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        (**self).send_configuration(device_id, payload)
    }
}
