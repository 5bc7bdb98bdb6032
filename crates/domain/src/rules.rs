//! Rule set: the bindings, slots and device pool the resolver works from.
//!
//! Binding order is significant: it is the definition order used to break
//! priority ties.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::error::{ClimateError, NotFoundError, ValidationError};
use crate::id::{BindingId, CalendarId, DeviceId, SlotId};
use crate::slot::Slot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    /// Global device pool targeted by bindings without explicit targets.
    #[serde(default)]
    pub devices: BTreeSet<DeviceId>,
}

impl RuleSet {
    /// Check every binding and slot and their cross references.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] on the first duplicate id,
    /// invalid binding, invalid slot or dangling slot reference.
    pub fn validate(&self) -> Result<(), ClimateError> {
        let mut slot_ids = HashSet::new();
        for slot in &self.slots {
            if !slot_ids.insert(&slot.id) {
                return Err(duplicate("slot", slot.id.as_str()));
            }
            slot.validate()?;
        }
        let mut binding_ids = HashSet::new();
        for binding in &self.bindings {
            if !binding_ids.insert(&binding.id) {
                return Err(duplicate("binding", binding.id.as_str()));
            }
            binding.validate()?;
            if !slot_ids.contains(&binding.target_slot_id) {
                return Err(unknown_slot(binding).into());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn slot(&self, id: &SlotId) -> Option<&Slot> {
        self.slots.iter().find(|slot| &slot.id == id)
    }

    #[must_use]
    pub fn binding(&self, id: &BindingId) -> Option<&Binding> {
        self.bindings.iter().find(|binding| &binding.id == id)
    }

    /// Bindings listening to `calendar_id`, in definition order.
    pub fn bindings_for_calendar<'a>(
        &'a self,
        calendar_id: &'a CalendarId,
    ) -> impl Iterator<Item = &'a Binding> + 'a {
        self.bindings
            .iter()
            .filter(move |binding| binding.is_calendar_eligible(calendar_id))
    }

    /// Bindings pointing at `slot_id`, in definition order.
    pub fn bindings_for_slot<'a>(
        &'a self,
        slot_id: &'a SlotId,
    ) -> impl Iterator<Item = &'a Binding> + 'a {
        self.bindings
            .iter()
            .filter(move |binding| &binding.target_slot_id == slot_id)
    }

    /// Append a binding; it becomes the last-defined one.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] for a duplicate id, an invalid
    /// binding or an unknown slot.
    pub fn add_binding(&mut self, binding: Binding) -> Result<(), ClimateError> {
        if self.binding(&binding.id).is_some() {
            return Err(duplicate("binding", binding.id.as_str()));
        }
        self.check_binding(&binding)?;
        self.bindings.push(binding);
        Ok(())
    }

    /// Replace a binding in place, keeping its definition order.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::NotFound`] when no binding has this id, or
    /// [`ClimateError::Validation`] when the new binding is invalid.
    pub fn update_binding(&mut self, binding: Binding) -> Result<(), ClimateError> {
        self.check_binding(&binding)?;
        let existing = self
            .bindings
            .iter_mut()
            .find(|existing| existing.id == binding.id)
            .ok_or_else(|| not_found("Binding", binding.id.as_str()))?;
        *existing = binding;
        Ok(())
    }

    /// Remove and return a binding.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::NotFound`] when no binding has this id.
    pub fn remove_binding(&mut self, id: &BindingId) -> Result<Binding, ClimateError> {
        let index = self
            .bindings
            .iter()
            .position(|binding| &binding.id == id)
            .ok_or_else(|| not_found("Binding", id.as_str()))?;
        Ok(self.bindings.remove(index))
    }

    /// Insert a new slot or replace the one with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] when the slot is invalid.
    pub fn upsert_slot(&mut self, slot: Slot) -> Result<(), ClimateError> {
        slot.validate()?;
        match self.slots.iter_mut().find(|existing| existing.id == slot.id) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
        Ok(())
    }

    /// Remove and return a slot no binding references.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] with [`ValidationError::SlotInUse`]
    /// while a binding still targets it, or [`ClimateError::NotFound`].
    pub fn remove_slot(&mut self, id: &SlotId) -> Result<Slot, ClimateError> {
        if let Some(binding) = self.bindings_for_slot(id).next() {
            return Err(ValidationError::SlotInUse {
                slot_id: id.clone(),
                binding_id: binding.id.clone(),
            }
            .into());
        }
        let index = self
            .slots
            .iter()
            .position(|slot| &slot.id == id)
            .ok_or_else(|| not_found("Slot", id.as_str()))?;
        Ok(self.slots.remove(index))
    }

    fn check_binding(&self, binding: &Binding) -> Result<(), ClimateError> {
        binding.validate()?;
        if self.slot(&binding.target_slot_id).is_none() {
            return Err(unknown_slot(binding).into());
        }
        Ok(())
    }
}

fn duplicate(kind: &'static str, id: &str) -> ClimateError {
    ValidationError::DuplicateId {
        kind,
        id: id.to_string(),
    }
    .into()
}

fn unknown_slot(binding: &Binding) -> ValidationError {
    ValidationError::UnknownSlotReference {
        binding_id: binding.id.clone(),
        slot_id: binding.target_slot_id.clone(),
    }
}

fn not_found(entity: &'static str, id: &str) -> ClimateError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}
