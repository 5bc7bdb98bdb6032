//! Binding: links a calendar event pattern to a slot.
//!
//! When an active event from one of the binding's calendars matches its rule,
//! the binding's slot becomes a candidate for every targeted device. The
//! highest `priority` wins; ties go to the binding defined last.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ClimateError, ValidationError};
use crate::id::{BindingId, CalendarId, DeviceId, SlotId};
use crate::matching::{CalendarScope, MatchRule};

/// A calendar-pattern-to-slot rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: BindingId,
    #[serde(default)]
    pub calendars: CalendarScope,
    #[serde(rename = "match")]
    pub rule: MatchRule,
    #[serde(alias = "slot_id")]
    pub target_slot_id: SlotId,
    /// Explicit targets. `None` means the global device pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entities: Option<BTreeSet<DeviceId>>,
    #[serde(default)]
    pub priority: i32,
}

impl Binding {
    /// Create a builder for constructing a [`Binding`].
    #[must_use]
    pub fn builder() -> BindingBuilder {
        BindingBuilder::default()
    }

    /// Check the binding on its own. Slot existence is checked by the
    /// [`RuleSet`](crate::rules::RuleSet).
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] when the match rule is unusable.
    pub fn validate(&self) -> Result<(), ClimateError> {
        self.rule.validate()?;
        Ok(())
    }

    /// Whether events from `calendar_id` are considered at all.
    #[must_use]
    pub fn is_calendar_eligible(&self, calendar_id: &CalendarId) -> bool {
        self.calendars.includes(calendar_id)
    }

    /// Devices this binding targets before exclusions. An empty explicit
    /// list falls back to the pool.
    pub fn targets<'a>(
        &'a self,
        pool: &'a BTreeSet<DeviceId>,
    ) -> impl Iterator<Item = &'a DeviceId> + 'a {
        self.target_entities
            .as_ref()
            .filter(|explicit| !explicit.is_empty())
            .unwrap_or(pool)
            .iter()
    }
}

/// Step-by-step builder for [`Binding`].
#[derive(Debug, Default)]
pub struct BindingBuilder {
    id: Option<BindingId>,
    calendars: CalendarScope,
    rule: Option<MatchRule>,
    target_slot_id: Option<SlotId>,
    target_entities: Option<BTreeSet<DeviceId>>,
    priority: i32,
}

impl BindingBuilder {
    #[must_use]
    pub fn id(mut self, id: BindingId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn calendars(mut self, calendars: CalendarScope) -> Self {
        self.calendars = calendars;
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: MatchRule) -> Self {
        self.rule = Some(rule);
        self
    }

    #[must_use]
    pub fn slot(mut self, slot_id: SlotId) -> Self {
        self.target_slot_id = Some(slot_id);
        self
    }

    #[must_use]
    pub fn target(mut self, device_id: DeviceId) -> Self {
        self.target_entities
            .get_or_insert_with(BTreeSet::new)
            .insert(device_id);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Consume the builder, validate, and return a [`Binding`].
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] if the id, rule or slot is
    /// missing, or if [`Binding::validate`] fails.
    pub fn build(self) -> Result<Binding, ClimateError> {
        let id = self
            .id
            .ok_or(ValidationError::EmptyIdentifier { kind: "BindingId" })?;
        let rule = self.rule.ok_or(ValidationError::EmptyMatchValue)?;
        let target_slot_id = self
            .target_slot_id
            .ok_or(ValidationError::EmptyIdentifier { kind: "SlotId" })?;
        let binding = Binding {
            id,
            calendars: self.calendars,
            rule,
            target_slot_id,
            target_entities: self.target_entities,
            priority: self.priority,
        };
        binding.validate()?;
        Ok(binding)
    }
}
