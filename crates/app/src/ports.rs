//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod device_control;
pub mod event_source;
pub mod flag_store;
pub mod notifier;

pub use device_control::DeviceController;
pub use event_source::EventSource;
pub use flag_store::FlagStore;
pub use notifier::Notifier;
