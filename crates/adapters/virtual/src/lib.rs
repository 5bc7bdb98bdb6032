//! # climacal-adapter-virtual
//!
//! In-memory adapters used by the demo daemon and the tests.
//!
//! ## Provided adapters
//!
//! | Adapter | Port | Behaviour |
//! |---------|------|-----------|
//! | [`VirtualCalendar`] | `EventSource` | Serves configured events active at `now`; can be made unreachable |
//! | [`VirtualThermostats`] | `DeviceController` | Applies payloads as climate service calls and keeps per-device state |
//!
//! ## Dependency rule
//!
//! Depends on `climacal-app` (port traits) and `climacal-domain` only.

mod calendar;
mod error;
mod thermostat;

pub use calendar::VirtualCalendar;
pub use error::VirtualDeviceError;
pub use thermostat::{ServiceCall, VirtualThermostats, service_calls};
