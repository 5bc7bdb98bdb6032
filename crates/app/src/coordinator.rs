//! Coordinator: runs evaluation cycles and serves operator commands.
//!
//! A cycle snapshots the flag, fetches active events, resolves bindings,
//! checks flag expiry, overlays the flag and hands the decisions to the
//! executor. Only one
//! cycle runs at a time; the applied state it produces is fed into the
//! next one. Flag commands go through the [`FlagService`] and never wait
//! for a running cycle.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::MissedTickBehavior;

use climacal_domain::error::{ClimateError, NotFoundError};
use climacal_domain::flag::{FlagKind, FlagState, OverrideFlag};
use climacal_domain::id::{DeviceId, SlotId};
use climacal_domain::notification::Notification;
use climacal_domain::rules::RuleSet;
use climacal_domain::time::{Timestamp, now};

use crate::executor::{AppliedState, ApplyExecutor, ApplyResult, RetryPolicy};
use crate::overlay::finalize;
use crate::ports::{DeviceController, EventSource, FlagStore, Notifier};
use crate::resolver::BindingResolver;
use crate::services::flag_service::FlagService;

/// Runtime knobs of the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    pub dry_run: bool,
    pub timezone: Tz,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            dry_run: true,
            timezone: chrono_tz::UTC,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened during one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub evaluated_at: Timestamp,
    pub active_events: usize,
    pub unmapped_events: Vec<String>,
    pub config_errors: Vec<String>,
    pub flag: FlagState,
    pub dry_run: bool,
    pub results: Vec<ApplyResult>,
}

/// Operator-facing snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub dry_run: bool,
    pub timezone: String,
    pub poll_interval_secs: u64,
    pub flag: Option<OverrideFlag>,
    pub flag_state: FlagState,
    pub bindings: usize,
    pub slots: usize,
    pub devices: usize,
    pub last_cycle: Option<CycleSummary>,
}

pub struct Coordinator<E, D, S, N> {
    source: E,
    executor: ApplyExecutor<D, N>,
    flags: FlagService<S, N>,
    notifier: N,
    rules: RwLock<RuleSet>,
    resolver: Mutex<BindingResolver>,
    /// Held for the whole cycle.
    applied: Mutex<AppliedState>,
    last_winners: Mutex<BTreeMap<DeviceId, SlotId>>,
    last_cycle: RwLock<Option<CycleSummary>>,
    dry_run: AtomicBool,
    trigger: Notify,
    settings: CoordinatorSettings,
}

impl<E, D, S, N> Coordinator<E, D, S, N>
where
    E: EventSource + Send + Sync,
    D: DeviceController + Send + Sync,
    S: FlagStore + Send + Sync,
    N: Notifier + Clone + Send + Sync,
{
    /// Wire the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] when `rules` is inconsistent.
    pub fn new(
        source: E,
        controller: D,
        store: S,
        notifier: N,
        rules: RuleSet,
        settings: CoordinatorSettings,
    ) -> Result<Self, ClimateError> {
        rules.validate()?;
        Ok(Self {
            source,
            executor: ApplyExecutor::new(controller, notifier.clone(), settings.retry),
            flags: FlagService::new(store, notifier.clone()),
            notifier,
            rules: RwLock::new(rules),
            resolver: Mutex::new(BindingResolver::new()),
            applied: Mutex::new(AppliedState::default()),
            last_winners: Mutex::new(BTreeMap::new()),
            last_cycle: RwLock::new(None),
            dry_run: AtomicBool::new(settings.dry_run),
            trigger: Notify::new(),
            settings,
        })
    }

    /// Load the persisted flag, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the flag store.
    pub async fn restore_flag(&self) -> Result<Option<OverrideFlag>, ClimateError> {
        self.flags.restore().await
    }

    /// Run one cycle at the current time.
    ///
    /// # Errors
    ///
    /// See [`run_cycle_at`](Self::run_cycle_at).
    pub async fn run_cycle(&self) -> Result<CycleSummary, ClimateError> {
        self.run_cycle_at(now()).await
    }

    /// Run one cycle as if the clock read `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::EventSource`] when the calendar cannot be
    /// queried. Nothing is applied and the applied state is left as is.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle_at(&self, now: Timestamp) -> Result<CycleSummary, ClimateError> {
        let mut applied = self.applied.lock().await;
        // Flags set after this point wait for the next cycle.
        let snapshot = self.flags.current().await;

        let events = self.source.fetch_active_events(now).await?;
        let active: Vec<_> = events
            .into_iter()
            .filter(|event| event.is_active_at(now))
            .collect();

        let rules = self.rules.read().await;
        let report = self.resolver.lock().await.resolve(&active, &rules);
        for err in &report.config_errors {
            tracing::warn!(%err, "configuration error");
        }
        let winners = report.winners();
        *self.last_winners.lock().await = winners.clone();

        let mut flag = snapshot;
        if let Some(current) = &flag
            && let Some(reason) = current.check_expiry(now, self.settings.timezone, &winners)
        {
            if let Err(err) = self.flags.clear_if_current(current, reason).await {
                tracing::warn!(%err, "failed to clear expired flag");
            }
            flag = None;
        }

        let overlay = finalize(&report, flag.as_ref(), &rules);
        drop(rules);
        let mut config_errors: Vec<String> =
            report.config_errors.iter().map(ToString::to_string).collect();
        if let Some(err) = &overlay.config_error {
            config_errors.push(err.to_string());
        }

        let dry_run = self.is_dry_run();
        let outcome = self
            .executor
            .apply(&overlay.decisions, std::mem::take(&mut *applied), dry_run)
            .await;
        *applied = outcome.state.clone();
        drop(applied);

        tracing::info!(
            active = active.len(),
            changed = outcome.changed(),
            failed = outcome.failed(),
            skipped = outcome.skipped(),
            dry_run,
            "evaluation complete"
        );
        self.notify(Notification::evaluation_complete(
            outcome.changed(),
            outcome.failed(),
            outcome.skipped(),
            dry_run,
        ))
        .await;

        let summary = CycleSummary {
            evaluated_at: now,
            active_events: active.len(),
            unmapped_events: report.unmapped.iter().map(|e| e.summary.clone()).collect(),
            config_errors,
            flag: FlagState::from(flag.as_ref()),
            dry_run,
            results: outcome.results,
        };
        *self.last_cycle.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// Set an override flag. Takes effect from the next cycle, which is
    /// requested immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::NotFound`] when forcing an unknown slot,
    /// [`ClimateError::Validation`] for a force without target, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn set_flag(
        &self,
        kind: FlagKind,
        target_slot_id: Option<SlotId>,
    ) -> Result<OverrideFlag, ClimateError> {
        if let (FlagKind::ForceSlot, Some(slot_id)) = (kind, &target_slot_id)
            && self.rules.read().await.slot(slot_id).is_none()
        {
            return Err(NotFoundError {
                entity: "Slot",
                id: slot_id.to_string(),
            }
            .into());
        }
        let baseline = self.last_winners.lock().await.clone();
        let flag = self.flags.set(kind, target_slot_id, baseline).await?;
        self.refresh_now();
        Ok(flag)
    }

    /// Force `slot_id` on every device until cleared.
    ///
    /// # Errors
    ///
    /// See [`set_flag`](Self::set_flag).
    pub async fn force_slot(&self, slot_id: SlotId) -> Result<OverrideFlag, ClimateError> {
        self.set_flag(FlagKind::ForceSlot, Some(slot_id)).await
    }

    /// Clear the active flag and request a cycle.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the flag store.
    pub async fn clear_flag(&self) -> Result<Option<OverrideFlag>, ClimateError> {
        let cleared = self.flags.clear().await?;
        self.refresh_now();
        Ok(cleared)
    }

    /// Ask the poll loop for a cycle as soon as possible. Requests made
    /// while a cycle runs collapse into a single follow-up cycle.
    pub fn refresh_now(&self) {
        self.trigger.notify_one();
    }

    /// Validate and swap the rule set.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] and keeps the current rules
    /// when `rules` is inconsistent.
    pub async fn replace_rules(&self, rules: RuleSet) -> Result<(), ClimateError> {
        self.update_rules(move |current| {
            *current = rules;
            Ok(())
        })
        .await
    }

    /// Run `edit` on a copy of the rule set and swap the copy in once it
    /// validates. Edits are serialized; a cycle in progress keeps the rules
    /// it started with. A follow-up cycle is requested on success.
    ///
    /// # Errors
    ///
    /// Returns the error of `edit`, or [`ClimateError::Validation`] when the
    /// edited set is inconsistent. The current rules are kept either way.
    pub async fn update_rules<T>(
        &self,
        edit: impl FnOnce(&mut RuleSet) -> Result<T, ClimateError>,
    ) -> Result<T, ClimateError> {
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        let output = edit(&mut next)?;
        next.validate()?;
        self.resolver.lock().await.cache_mut().retain(&next);
        *rules = next;
        tracing::info!(
            bindings = rules.bindings.len(),
            slots = rules.slots.len(),
            "rule set updated"
        );
        drop(rules);
        self.refresh_now();
        Ok(output)
    }

    /// Copy of the current rule set.
    pub async fn rules(&self) -> RuleSet {
        self.rules.read().await.clone()
    }

    /// Current override flag.
    pub async fn flag(&self) -> Option<OverrideFlag> {
        self.flags.current().await
    }

    pub fn set_dry_run(&self, enabled: bool) {
        let previous = self.dry_run.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::warn!(dry_run = enabled, "dry run mode changed");
        }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let flag = self.flags.current().await;
        let rules = self.rules.read().await;
        CoordinatorStatus {
            dry_run: self.is_dry_run(),
            timezone: self.settings.timezone.name().to_string(),
            poll_interval_secs: self.settings.poll_interval.as_secs(),
            flag_state: FlagState::from(flag.as_ref()),
            flag,
            bindings: rules.bindings.len(),
            slots: rules.slots.len(),
            devices: rules.devices.len(),
            last_cycle: self.last_cycle.read().await.clone(),
        }
    }

    /// Poll loop: one cycle per interval tick or refresh request, until
    /// `shutdown` resolves. The first cycle runs immediately.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            dry_run = self.is_dry_run(),
            "poll loop started"
        );
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
                () = self.trigger.notified() => {}
            }
            if let Err(err) = self.run_cycle().await {
                tracing::error!(%err, "evaluation cycle failed");
            }
        }
        tracing::info!("poll loop stopped");
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.publish(notification).await {
            tracing::warn!(%err, "failed to publish notification");
        }
    }
}
