//! Binding resolver: active events and bindings to per-device winners.
//!
//! For every active event the resolver collects the bindings that are
//! calendar-eligible, whose rule matches the summary and whose slot exists.
//! Each such binding is a candidate for its targets minus the slot's
//! exclusions. Per device the highest priority wins; on a tie the binding
//! defined later wins.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use climacal_domain::binding::Binding;
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::decision::{Candidate, Resolution};
use climacal_domain::error::{ConfigurationError, ValidationError};
use climacal_domain::id::{BindingId, DeviceId, SlotId};
use climacal_domain::matching::{CompiledMatcher, MatchRule};
use climacal_domain::rules::RuleSet;

/// Compiled matchers keyed by binding id.
///
/// An entry is recompiled when the binding's rule changes. Compile
/// failures are cached too, so a broken pattern is reported once.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: HashMap<BindingId, CachedPattern>,
}

#[derive(Debug)]
struct CachedPattern {
    rule: MatchRule,
    compiled: Result<CompiledMatcher, ValidationError>,
}

impl CachedPattern {
    fn compile(binding: &Binding) -> Self {
        let compiled = binding.rule.compile();
        if let Err(err) = &compiled {
            tracing::error!(binding = %binding.id, %err, "binding rule can never match");
        }
        Self {
            rule: binding.rule.clone(),
            compiled,
        }
    }
}

impl PatternCache {
    /// Matcher for `binding`, compiling it on first use or after a change.
    ///
    /// # Errors
    ///
    /// Returns the cached [`ValidationError`] when the rule is unusable.
    pub fn matcher(&mut self, binding: &Binding) -> Result<&CompiledMatcher, &ValidationError> {
        let entry = self
            .entries
            .entry(binding.id.clone())
            .and_modify(|cached| {
                if cached.rule != binding.rule {
                    *cached = CachedPattern::compile(binding);
                }
            })
            .or_insert_with(|| CachedPattern::compile(binding));
        entry.compiled.as_ref()
    }

    /// Drop entries for bindings no longer present in `rules` or whose
    /// rule was edited.
    pub fn retain(&mut self, rules: &RuleSet) {
        self.entries.retain(|id, cached| {
            rules
                .binding(id)
                .is_some_and(|binding| binding.rule == cached.rule)
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of [`BindingResolver::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// One entry per device that has something to say this cycle.
    pub devices: BTreeMap<DeviceId, Resolution>,
    /// Active events no usable binding matched.
    pub unmapped: Vec<CalendarEvent>,
    /// Problems found in the rule set, one per offending binding.
    pub config_errors: Vec<ConfigurationError>,
}

impl ResolutionReport {
    /// Winning slot per device, before any flag.
    #[must_use]
    pub fn winners(&self) -> BTreeMap<DeviceId, SlotId> {
        self.devices
            .iter()
            .filter_map(|(device, resolution)| {
                resolution
                    .winner()
                    .map(|candidate| (device.clone(), candidate.slot_id.clone()))
            })
            .collect()
    }
}

/// Resolves active events against a rule set, caching compiled patterns.
#[derive(Debug, Default)]
pub struct BindingResolver {
    cache: PatternCache,
}

impl BindingResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the pattern cache, e.g. to prune it after a rule change.
    pub fn cache_mut(&mut self) -> &mut PatternCache {
        &mut self.cache
    }

    /// Compute the pre-flag resolution for every device.
    pub fn resolve(&mut self, events: &[CalendarEvent], rules: &RuleSet) -> ResolutionReport {
        let mut best: BTreeMap<DeviceId, Candidate> = BTreeMap::new();
        let mut excluded: BTreeMap<DeviceId, (SlotId, BindingId)> = BTreeMap::new();
        let mut unmapped = Vec::new();
        let mut config_errors = Vec::new();
        let mut reported: HashSet<BindingId> = HashSet::new();

        for event in events {
            let mut mapped = false;
            for (order, binding) in rules.bindings.iter().enumerate() {
                if !binding.is_calendar_eligible(&event.calendar_id) {
                    continue;
                }
                let matched = match self.cache.matcher(binding) {
                    Ok(matcher) => matcher.matches(&event.summary),
                    Err(err) => {
                        if reported.insert(binding.id.clone()) {
                            config_errors.push(rule_error(binding, err));
                        }
                        continue;
                    }
                };
                if !matched {
                    continue;
                }
                let Some(slot) = rules.slot(&binding.target_slot_id) else {
                    if reported.insert(binding.id.clone()) {
                        tracing::warn!(
                            binding = %binding.id,
                            slot = %binding.target_slot_id,
                            "binding references a missing slot, skipping"
                        );
                        config_errors.push(ConfigurationError::DanglingSlot {
                            binding_id: binding.id.clone(),
                            slot_id: binding.target_slot_id.clone(),
                        });
                    }
                    continue;
                };
                mapped = true;

                let candidate = Candidate {
                    binding_id: binding.id.clone(),
                    slot_id: slot.id.clone(),
                    priority: binding.priority,
                    order,
                    calendar_id: event.calendar_id.clone(),
                    event_summary: event.summary.clone(),
                };
                for device in binding.targets(&rules.devices) {
                    if slot.excludes(device) {
                        excluded
                            .entry(device.clone())
                            .or_insert_with(|| (slot.id.clone(), binding.id.clone()));
                        continue;
                    }
                    match best.entry(device.clone()) {
                        Entry::Vacant(entry) => {
                            entry.insert(candidate.clone());
                        }
                        Entry::Occupied(mut entry) => {
                            if candidate.rank() > entry.get().rank() {
                                entry.insert(candidate.clone());
                            }
                        }
                    }
                }
            }
            if !mapped {
                tracing::warn!(
                    calendar = %event.calendar_id,
                    summary = %event.summary,
                    "active event matches no binding"
                );
                unmapped.push(event.clone());
            }
        }

        let mut devices: BTreeMap<DeviceId, Resolution> = best
            .into_iter()
            .map(|(device, candidate)| (device, Resolution::Slot(candidate)))
            .collect();
        for (device, (slot_id, binding_id)) in excluded {
            devices
                .entry(device)
                .or_insert(Resolution::Excluded {
                    slot_id,
                    binding_id,
                });
        }
        if !unmapped.is_empty() {
            for device in &rules.devices {
                devices
                    .entry(device.clone())
                    .or_insert(Resolution::Unmapped);
            }
        }

        ResolutionReport {
            devices,
            unmapped,
            config_errors,
        }
    }
}

fn rule_error(binding: &Binding, err: &ValidationError) -> ConfigurationError {
    match err {
        ValidationError::InvalidPattern { pattern, reason } => ConfigurationError::InvalidPattern {
            binding_id: binding.id.clone(),
            pattern: pattern.clone(),
            reason: reason.clone(),
        },
        ValidationError::UnsupportedMatchType(match_type) => {
            ConfigurationError::UnsupportedMatchType {
                binding_id: binding.id.clone(),
                match_type: match_type.clone(),
            }
        }
        other => ConfigurationError::InvalidRule {
            binding_id: binding.id.clone(),
            reason: other.to_string(),
        },
    }
}
