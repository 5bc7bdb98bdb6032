use climacal_domain::error::ClimateError;
use climacal_domain::id::DeviceId;

/// Failures raised by the virtual adapters.
#[derive(Debug, thiserror::Error)]
pub enum VirtualDeviceError {
    #[error("unknown climate device {0}")]
    UnknownDevice(DeviceId),
    #[error("climate device {0} is unavailable")]
    Unavailable(DeviceId),
    #[error("calendar is unreachable")]
    CalendarUnreachable,
}

impl From<VirtualDeviceError> for ClimateError {
    fn from(err: VirtualDeviceError) -> Self {
        match err {
            VirtualDeviceError::CalendarUnreachable => Self::EventSource(Box::new(err)),
            VirtualDeviceError::UnknownDevice(_) | VirtualDeviceError::Unavailable(_) => {
                Self::Transport(Box::new(err))
            }
        }
    }
}
