//! Typed identifier newtypes.
//!
//! Configuration-level identifiers (devices, calendars, slots, bindings) are
//! human-readable strings such as `climate.kitchen` or `calendar.work`.
//! Notification identifiers are generated UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_key {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Build an identifier, rejecting empty or blank values.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::EmptyIdentifier`] when `value` is blank.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValidationError::EmptyIdentifier {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key!(
    /// Identifier of a controlled device (e.g. `climate.kitchen`).
    DeviceId
);

define_key!(
    /// Identifier of a watched calendar (e.g. `calendar.work`).
    CalendarId
);

define_key!(
    /// Identifier of a [`Slot`](crate::slot::Slot).
    SlotId
);

define_key!(
    /// Identifier of a [`Binding`](crate::binding::Binding).
    BindingId
);

/// Unique identifier for a [`Notification`](crate::notification::Notification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(uuid::Uuid);

impl Default for NotificationId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl NotificationId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the inner UUID.
    #[must_use]
    pub fn as_uuid(self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
