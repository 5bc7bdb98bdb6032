//! Notification: an immutable record published for observers.
//!
//! Notifications carry a kind, the device they concern (if any) and a JSON
//! object of structured fields.

use serde::{Deserialize, Serialize};

use crate::decision::SkipReason;
use crate::flag::{ClearReason, OverrideFlag};
use crate::id::{DeviceId, NotificationId, SlotId};
use crate::payload::ClimatePayload;
use crate::time::{Timestamp, now};

/// Kind of notification published by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SlotChanged,
    DeviceApplied,
    DeviceSkipped,
    DryRun,
    FlagSet,
    FlagCleared,
    EvaluationComplete,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlotChanged => "slot_changed",
            Self::DeviceApplied => "device_applied",
            Self::DeviceSkipped => "device_skipped",
            Self::DryRun => "dry_run",
            Self::FlagSet => "flag_set",
            Self::FlagCleared => "flag_cleared",
            Self::EvaluationComplete => "evaluation_complete",
        }
    }
}

/// A published notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

/// Outcome of one device application, for `device_applied`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOutcome {
    pub success: bool,
    pub attempts: u32,
    pub error: Option<String>,
    pub simulated: bool,
}

impl Notification {
    fn build(kind: NotificationKind, device_id: Option<DeviceId>, data: serde_json::Value) -> Self {
        Self {
            id: NotificationId::new(),
            kind,
            device_id,
            data,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn slot_changed(device_id: DeviceId, old: Option<&SlotId>, new: Option<&SlotId>) -> Self {
        Self::build(
            NotificationKind::SlotChanged,
            Some(device_id),
            serde_json::json!({ "old_slot_id": old, "new_slot_id": new }),
        )
    }

    #[must_use]
    pub fn device_applied(
        device_id: DeviceId,
        slot_id: &SlotId,
        payload: &ClimatePayload,
        outcome: &AppliedOutcome,
    ) -> Self {
        Self::build(
            NotificationKind::DeviceApplied,
            Some(device_id),
            serde_json::json!({
                "slot_id": slot_id,
                "payload": payload,
                "success": outcome.success,
                "attempts": outcome.attempts,
                "error": outcome.error,
                "simulated": outcome.simulated,
            }),
        )
    }

    #[must_use]
    pub fn device_skipped(device_id: DeviceId, reason: SkipReason) -> Self {
        Self::build(
            NotificationKind::DeviceSkipped,
            Some(device_id),
            serde_json::json!({ "reason": reason.as_str() }),
        )
    }

    #[must_use]
    pub fn dry_run(device_id: DeviceId, slot_id: &SlotId, payload: &ClimatePayload) -> Self {
        Self::build(
            NotificationKind::DryRun,
            Some(device_id),
            serde_json::json!({
                "slot_id": slot_id,
                "payload": payload,
                "simulated": true,
            }),
        )
    }

    #[must_use]
    pub fn flag_set(flag: &OverrideFlag) -> Self {
        Self::build(
            NotificationKind::FlagSet,
            None,
            serde_json::json!({
                "type": flag.kind.as_str(),
                "target_slot_id": flag.target_slot_id,
                "set_at": flag.set_at,
            }),
        )
    }

    #[must_use]
    pub fn flag_cleared(flag: &OverrideFlag, reason: ClearReason) -> Self {
        Self::build(
            NotificationKind::FlagCleared,
            None,
            serde_json::json!({
                "type": flag.kind.as_str(),
                "reason": reason.as_str(),
            }),
        )
    }

    #[must_use]
    pub fn evaluation_complete(applied: usize, failed: usize, skipped: usize, dry_run: bool) -> Self {
        Self::build(
            NotificationKind::EvaluationComplete,
            None,
            serde_json::json!({
                "applied": applied,
                "failed": failed,
                "skipped": skipped,
                "dry_run": dry_run,
            }),
        )
    }
}
