//! Flag overlay and payload merge: resolver output to final decisions.
//!
//! Runs after resolution and before the executor. Skip flags turn every
//! known device into a skip. A forced slot replaces every device's slot,
//! still subject to that slot's exclusions.

use std::collections::{BTreeMap, BTreeSet};

use climacal_domain::decision::{Decision, DecisionSource, Resolution, SkipReason};
use climacal_domain::error::ConfigurationError;
use climacal_domain::flag::{FlagKind, OverrideFlag};
use climacal_domain::id::DeviceId;
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::{Slot, SlotPayload};

use crate::resolver::ResolutionReport;

/// Final decisions for a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub decisions: BTreeMap<DeviceId, Decision>,
    /// Set when the active flag could not be honoured.
    pub config_error: Option<ConfigurationError>,
}

/// Combine the resolver report with the current flag.
#[must_use]
pub fn finalize(report: &ResolutionReport, flag: Option<&OverrideFlag>, rules: &RuleSet) -> Overlay {
    let Some(flag) = flag else {
        return Overlay {
            decisions: from_resolutions(report, rules),
            config_error: None,
        };
    };
    let devices = known_devices(report, rules);
    match (flag.kind, &flag.target_slot_id) {
        (FlagKind::ForceSlot, Some(slot_id)) => match rules.slot(slot_id) {
            Some(slot) => Overlay {
                decisions: devices
                    .into_iter()
                    .map(|device| {
                        let decision = slot_decision(slot, &device, DecisionSource::Flag);
                        (device, decision)
                    })
                    .collect(),
                config_error: None,
            },
            None => {
                tracing::warn!(slot = %slot_id, "forced slot no longer exists, leaving devices untouched");
                Overlay {
                    decisions: BTreeMap::new(),
                    config_error: Some(ConfigurationError::MissingForcedSlot {
                        slot_id: slot_id.clone(),
                    }),
                }
            }
        },
        (kind, _) => {
            let reason = SkipReason::FlagSkip(kind);
            Overlay {
                decisions: devices
                    .into_iter()
                    .map(|device| (device, Decision::Skip { reason }))
                    .collect(),
                config_error: None,
            }
        }
    }
}

fn from_resolutions(report: &ResolutionReport, rules: &RuleSet) -> BTreeMap<DeviceId, Decision> {
    report
        .devices
        .iter()
        .filter_map(|(device, resolution)| {
            let decision = match resolution {
                Resolution::Slot(candidate) => {
                    let slot = rules.slot(&candidate.slot_id)?;
                    slot_decision(
                        slot,
                        device,
                        DecisionSource::Binding {
                            binding_id: candidate.binding_id.clone(),
                        },
                    )
                }
                Resolution::Excluded { .. } => Decision::Skip {
                    reason: SkipReason::ExcludedEntity,
                },
                Resolution::Unmapped => Decision::Skip {
                    reason: SkipReason::UnmappedEvent,
                },
            };
            Some((device.clone(), decision))
        })
        .collect()
}

fn slot_decision(slot: &Slot, device: &DeviceId, source: DecisionSource) -> Decision {
    match slot.payload_for(device) {
        SlotPayload::Payload(payload) => Decision::Apply {
            slot_id: slot.id.clone(),
            payload,
            source,
        },
        SlotPayload::Excluded => Decision::Skip {
            reason: SkipReason::ExcludedEntity,
        },
    }
}

fn known_devices(report: &ResolutionReport, rules: &RuleSet) -> BTreeSet<DeviceId> {
    rules
        .devices
        .iter()
        .chain(report.devices.keys())
        .cloned()
        .collect()
}
