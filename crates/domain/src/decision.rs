//! Per-device outcomes of a cycle: resolver results and final decisions.

use std::fmt;

use serde::Serialize;

use crate::flag::FlagKind;
use crate::id::{BindingId, CalendarId, SlotId};
use crate::payload::ClimatePayload;

/// A (binding, event) pair competing for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub binding_id: BindingId,
    pub slot_id: SlotId,
    pub priority: i32,
    /// Definition index of the binding; larger means defined later.
    pub order: usize,
    pub calendar_id: CalendarId,
    pub event_summary: String,
}

impl Candidate {
    /// Ordering key: higher priority first, then the later definition.
    #[must_use]
    pub fn rank(&self) -> (i32, usize) {
        (self.priority, self.order)
    }
}

/// Resolver output for a single device, before flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// A binding won the device.
    Slot(Candidate),
    /// Every matching binding's slot excludes the device.
    Excluded {
        slot_id: SlotId,
        binding_id: BindingId,
    },
    /// An active event matched no binding and nothing else claims the device.
    Unmapped,
}

impl Resolution {
    #[must_use]
    pub fn winner(&self) -> Option<&Candidate> {
        match self {
            Self::Slot(candidate) => Some(candidate),
            Self::Excluded { .. } | Self::Unmapped => None,
        }
    }
}

/// Why a device is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExcludedEntity,
    FlagSkip(FlagKind),
    UnmappedEvent,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExcludedEntity => "excluded_entity",
            Self::FlagSkip(_) => "flag_skip",
            Self::UnmappedEvent => "unmapped_event",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced an apply decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionSource {
    Binding { binding_id: BindingId },
    Flag,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binding { binding_id } => write!(f, "binding:{binding_id}"),
            Self::Flag => f.write_str("flag"),
        }
    }
}

/// Final per-device decision handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Apply {
        slot_id: SlotId,
        payload: ClimatePayload,
        source: DecisionSource,
    },
    Skip { reason: SkipReason },
}

impl Decision {
    #[must_use]
    pub fn slot_id(&self) -> Option<&SlotId> {
        match self {
            Self::Apply { slot_id, .. } => Some(slot_id),
            Self::Skip { .. } => None,
        }
    }
}
