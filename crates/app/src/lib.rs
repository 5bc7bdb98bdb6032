//! # climacal-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EventSource`: fetch the calendar events active right now
//!   - `DeviceController`: push a climate payload to one device
//!   - `Notifier`: publish notifications to observers
//!   - `FlagStore`: persist the current override flag
//! - Provide the cycle pipeline:
//!   - `BindingResolver`: active events and bindings to per-device winners
//!   - `overlay::finalize`: apply the override flag and merge slot payloads
//!   - `ApplyExecutor`: sequential apply with retry and change detection
//! - Define **driving/inbound ports** as use-case structs:
//!   - `FlagService`: set and clear the override flag
//!   - `Coordinator`: cycle orchestration, poll loop and operator commands
//! - Provide **in-process infrastructure** (notification bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `climacal-domain` only (plus `tokio` for sync and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod coordinator;
pub mod executor;
pub mod notification_bus;
pub mod overlay;
pub mod ports;
pub mod resolver;
pub mod services;

#[cfg(test)]
mod test_support;
