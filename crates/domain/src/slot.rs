//! Slot: a named, reusable climate profile.
//!
//! A slot carries a default payload, optional per-device overrides and a set
//! of devices it must never touch. [`Slot::payload_for`] is the
//! entity-override merger: exclusion first, then a shallow overlay.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ClimateError, ValidationError};
use crate::id::{DeviceId, SlotId};
use crate::payload::ClimatePayload;

/// A reusable configuration profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub label: String,
    #[serde(alias = "default_climate_payload")]
    pub default_payload: ClimatePayload,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entity_overrides: BTreeMap<DeviceId, ClimatePayload>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_entities: BTreeSet<DeviceId>,
}

/// Outcome of merging a slot for one device.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotPayload {
    Payload(ClimatePayload),
    Excluded,
}

impl Slot {
    /// Create a builder for constructing a [`Slot`].
    #[must_use]
    pub fn builder() -> SlotBuilder {
        SlotBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] when:
    /// - `label` is blank ([`ValidationError::EmptyLabel`])
    /// - `default_payload` is invalid (see [`ClimatePayload::validate`])
    /// - an entity override is out of range
    pub fn validate(&self) -> Result<(), ClimateError> {
        if self.label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel.into());
        }
        self.default_payload.validate()?;
        for payload in self.entity_overrides.values() {
            payload.validate_ranges()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn excludes(&self, device_id: &DeviceId) -> bool {
        self.excluded_entities.contains(device_id)
    }

    /// Final payload for `device_id`.
    #[must_use]
    pub fn payload_for(&self, device_id: &DeviceId) -> SlotPayload {
        if self.excludes(device_id) {
            return SlotPayload::Excluded;
        }
        let payload = match self.entity_overrides.get(device_id) {
            Some(overlay) => self.default_payload.merged_with(overlay),
            None => self.default_payload.clone(),
        };
        SlotPayload::Payload(payload)
    }
}

/// Step-by-step builder for [`Slot`].
#[derive(Debug, Default)]
pub struct SlotBuilder {
    id: Option<SlotId>,
    label: Option<String>,
    default_payload: ClimatePayload,
    entity_overrides: BTreeMap<DeviceId, ClimatePayload>,
    excluded_entities: BTreeSet<DeviceId>,
}

impl SlotBuilder {
    #[must_use]
    pub fn id(mut self, id: SlotId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn default_payload(mut self, payload: ClimatePayload) -> Self {
        self.default_payload = payload;
        self
    }

    #[must_use]
    pub fn entity_override(mut self, device_id: DeviceId, payload: ClimatePayload) -> Self {
        self.entity_overrides.insert(device_id, payload);
        self
    }

    #[must_use]
    pub fn exclude(mut self, device_id: DeviceId) -> Self {
        self.excluded_entities.insert(device_id);
        self
    }

    /// Consume the builder, validate, and return a [`Slot`].
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] if the id is missing or the slot
    /// fails [`Slot::validate`].
    pub fn build(self) -> Result<Slot, ClimateError> {
        let id = self.id.ok_or(ValidationError::EmptyIdentifier { kind: "SlotId" })?;
        let label = self.label.unwrap_or_else(|| id.to_string());
        let slot = Slot {
            id,
            label,
            default_payload: self.default_payload,
            entity_overrides: self.entity_overrides,
            excluded_entities: self.excluded_entities,
        };
        slot.validate()?;
        Ok(slot)
    }
}
