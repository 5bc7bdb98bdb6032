//! Override flag: a manual, global pre-emption of the resolver.
//!
//! At most one flag is active at a time. Setting a flag replaces whatever
//! was there before.
//!
//! ```text
//! NONE ──set──▶ SKIP_TODAY ──────────── local midnight / clear ──▶ NONE
//!      ──set──▶ SKIP_UNTIL_NEXT_SLOT ── winners change / clear ──▶ NONE
//!      ──set──▶ FORCE_SLOT(s) ───────── clear ───────────────────▶ NONE
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{DeviceId, SlotId};
use crate::time::{Timestamp, local_date};

/// Kind of manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    SkipToday,
    SkipUntilNextSlot,
    ForceSlot,
}

impl FlagKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipToday => "skip_today",
            Self::SkipUntilNextSlot => "skip_until_next_slot",
            Self::ForceSlot => "force_slot",
        }
    }

    #[must_use]
    pub fn is_skip(self) -> bool {
        matches!(self, Self::SkipToday | Self::SkipUntilNextSlot)
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip_today" => Ok(Self::SkipToday),
            "skip_until_next_slot" => Ok(Self::SkipUntilNextSlot),
            "force_slot" => Ok(Self::ForceSlot),
            other => Err(ValidationError::UnknownFlagKind(other.to_string())),
        }
    }
}

/// The active manual override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideFlag {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_slot_id: Option<SlotId>,
    pub set_at: Timestamp,
    /// Resolver winners in effect when the flag was set.
    #[serde(default)]
    pub baseline: BTreeMap<DeviceId, SlotId>,
}

impl OverrideFlag {
    /// Build a flag, enforcing that only `force_slot` carries a target.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingForceTarget`] for a `force_slot`
    /// flag without a target slot.
    pub fn new(
        kind: FlagKind,
        target_slot_id: Option<SlotId>,
        set_at: Timestamp,
        baseline: BTreeMap<DeviceId, SlotId>,
    ) -> Result<Self, ValidationError> {
        let target_slot_id = match kind {
            FlagKind::ForceSlot => Some(target_slot_id.ok_or(ValidationError::MissingForceTarget)?),
            FlagKind::SkipToday | FlagKind::SkipUntilNextSlot => None,
        };
        Ok(Self {
            kind,
            target_slot_id,
            set_at,
            baseline,
        })
    }

    /// Decide whether the flag has run its course at `now`.
    ///
    /// `current_winners` are the resolver winners of the cycle being
    /// evaluated, before the flag is applied.
    #[must_use]
    pub fn check_expiry(
        &self,
        now: Timestamp,
        tz: Tz,
        current_winners: &BTreeMap<DeviceId, SlotId>,
    ) -> Option<ClearReason> {
        match self.kind {
            FlagKind::SkipToday => {
                (local_date(now, tz) > local_date(self.set_at, tz)).then_some(ClearReason::ExpiredNewDay)
            }
            FlagKind::SkipUntilNextSlot => {
                (current_winners != &self.baseline).then_some(ClearReason::ExpiredNextSlot)
            }
            FlagKind::ForceSlot => None,
        }
    }
}

/// Read-only view of the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "slot_id", rename_all = "snake_case")]
pub enum FlagState {
    None,
    SkipToday,
    SkipUntilNextSlot,
    ForceSlot(SlotId),
}

impl From<Option<&OverrideFlag>> for FlagState {
    fn from(flag: Option<&OverrideFlag>) -> Self {
        let Some(flag) = flag else {
            return Self::None;
        };
        match (flag.kind, &flag.target_slot_id) {
            (FlagKind::SkipToday, _) => Self::SkipToday,
            (FlagKind::SkipUntilNextSlot, _) => Self::SkipUntilNextSlot,
            (FlagKind::ForceSlot, Some(slot_id)) => Self::ForceSlot(slot_id.clone()),
            // Unreachable through `OverrideFlag::new`; treat a corrupt record as absent.
            (FlagKind::ForceSlot, None) => Self::None,
        }
    }
}

/// Why a flag went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    Manual,
    ExpiredNewDay,
    ExpiredNextSlot,
    Replaced,
}

impl ClearReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ExpiredNewDay => "expired_new_day",
            Self::ExpiredNextSlot => "expired_next_slot",
            Self::Replaced => "replaced",
        }
    }
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
