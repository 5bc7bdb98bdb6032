//! Apply executor: pushes decisions to devices.
//!
//! Devices are processed one at a time in id order. A payload identical to
//! the last one applied to the device is not sent again. Failed calls are
//! retried with exponential backoff; a device that still fails keeps its
//! previous tracking so the next cycle tries again.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Serialize;

use climacal_domain::decision::{Decision, SkipReason};
use climacal_domain::error::ClimateError;
use climacal_domain::id::{DeviceId, SlotId};
use climacal_domain::notification::{AppliedOutcome, Notification};
use climacal_domain::payload::ClimatePayload;

use crate::ports::{DeviceController, Notifier};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// What the executor remembers between cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedState {
    /// Last payload successfully (or simulated) applied per device.
    pub payloads: BTreeMap<DeviceId, ClimatePayload>,
    /// Final slot of each device in the previous cycle.
    pub slots: BTreeMap<DeviceId, SlotId>,
    /// Devices currently in a skip state, with the reason.
    pub skips: BTreeMap<DeviceId, SkipReason>,
}

/// Per-device outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied { attempts: u32 },
    Simulated,
    Unchanged,
    Failed { attempts: u32, error: String },
    Skipped { reason: SkipReason },
    /// No decision this cycle.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub device_id: DeviceId,
    pub slot_id: Option<SlotId>,
    #[serde(flatten)]
    pub status: ApplyStatus,
}

/// Results of a cycle plus the state to carry into the next one.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub results: Vec<ApplyResult>,
    pub state: AppliedState,
}

impl ApplyReport {
    /// Devices that received (or would have received) a new payload.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.count(|status| matches!(status, ApplyStatus::Applied { .. } | ApplyStatus::Simulated))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, ApplyStatus::Failed { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, ApplyStatus::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&ApplyStatus) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.status))
            .count()
    }
}

/// Applies decisions through a [`DeviceController`], reporting via a [`Notifier`].
pub struct ApplyExecutor<D, N> {
    controller: D,
    notifier: N,
    retry: RetryPolicy,
}

impl<D, N> ApplyExecutor<D, N>
where
    D: DeviceController + Send + Sync,
    N: Notifier + Send + Sync,
{
    pub fn new(controller: D, notifier: N, retry: RetryPolicy) -> Self {
        Self {
            controller,
            notifier,
            retry,
        }
    }

    /// Apply `decisions`, starting from the state left by the previous cycle.
    pub async fn apply(
        &self,
        decisions: &BTreeMap<DeviceId, Decision>,
        previous: AppliedState,
        dry_run: bool,
    ) -> ApplyReport {
        let devices: BTreeSet<&DeviceId> = decisions.keys().chain(previous.slots.keys()).collect();
        let mut state = previous.clone();
        let mut results = Vec::with_capacity(devices.len());

        for device in devices {
            let decision = decisions.get(device);
            let old_slot = previous.slots.get(device);
            let new_slot = decision.and_then(Decision::slot_id);
            if old_slot != new_slot {
                tracing::info!(
                    device = %device,
                    old = ?old_slot.map(SlotId::as_str),
                    new = ?new_slot.map(SlotId::as_str),
                    "slot changed"
                );
                self.notify(Notification::slot_changed(device.clone(), old_slot, new_slot))
                    .await;
            }
            match new_slot {
                Some(slot_id) => state.slots.insert(device.clone(), slot_id.clone()),
                None => state.slots.remove(device),
            };

            let status = match decision {
                None => {
                    state.skips.remove(device);
                    ApplyStatus::Idle
                }
                Some(Decision::Skip { reason }) => {
                    if previous.skips.get(device) != Some(reason) {
                        tracing::info!(device = %device, %reason, "device skipped");
                        self.notify(Notification::device_skipped(device.clone(), *reason))
                            .await;
                    }
                    state.skips.insert(device.clone(), *reason);
                    ApplyStatus::Skipped { reason: *reason }
                }
                Some(Decision::Apply {
                    slot_id, payload, ..
                }) => {
                    state.skips.remove(device);
                    if previous.payloads.get(device) == Some(payload) {
                        tracing::debug!(device = %device, "payload unchanged");
                        ApplyStatus::Unchanged
                    } else if dry_run {
                        self.simulate(device, slot_id, payload).await;
                        state.payloads.insert(device.clone(), payload.clone());
                        ApplyStatus::Simulated
                    } else {
                        let status = self.send(device, slot_id, payload).await;
                        if matches!(status, ApplyStatus::Applied { .. }) {
                            state.payloads.insert(device.clone(), payload.clone());
                        }
                        status
                    }
                }
            };
            results.push(ApplyResult {
                device_id: device.clone(),
                slot_id: new_slot.cloned(),
                status,
            });
        }

        ApplyReport { results, state }
    }

    async fn simulate(&self, device: &DeviceId, slot_id: &SlotId, payload: &ClimatePayload) {
        tracing::warn!(
            device = %device,
            slot = %slot_id,
            ?payload,
            dry_run = true,
            "would apply climate payload"
        );
        let outcome = AppliedOutcome {
            success: true,
            attempts: 0,
            error: None,
            simulated: true,
        };
        self.notify(Notification::device_applied(
            device.clone(),
            slot_id,
            payload,
            &outcome,
        ))
        .await;
        self.notify(Notification::dry_run(device.clone(), slot_id, payload))
            .await;
    }

    #[tracing::instrument(skip_all, fields(device = %device, slot = %slot_id))]
    async fn send(&self, device: &DeviceId, slot_id: &SlotId, payload: &ClimatePayload) -> ApplyStatus {
        let (status, outcome) = match self.send_with_retry(device, payload).await {
            Ok(attempts) => {
                tracing::info!(attempts, "climate payload applied");
                (
                    ApplyStatus::Applied { attempts },
                    AppliedOutcome {
                        success: true,
                        attempts,
                        error: None,
                        simulated: false,
                    },
                )
            }
            Err((attempts, err)) => {
                let error = error_chain(&err);
                tracing::error!(attempts, error = %error, "giving up on device");
                (
                    ApplyStatus::Failed {
                        attempts,
                        error: error.clone(),
                    },
                    AppliedOutcome {
                        success: false,
                        attempts,
                        error: Some(error),
                        simulated: false,
                    },
                )
            }
        };
        self.notify(Notification::device_applied(
            device.clone(),
            slot_id,
            payload,
            &outcome,
        ))
        .await;
        status
    }

    async fn send_with_retry(
        &self,
        device: &DeviceId,
        payload: &ClimatePayload,
    ) -> Result<u32, (u32, ClimateError)> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.controller.send_configuration(device, payload).await {
                Ok(()) => return Ok(attempts),
                Err(err) if attempts <= self.retry.max_retries => {
                    let delay = self.retry.delay_after(attempts);
                    tracing::warn!(attempts, %err, ?delay, "device call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err((attempts, err)),
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.publish(notification).await {
            tracing::warn!(%err, "failed to publish notification");
        }
    }
}

fn error_chain(err: &ClimateError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::*;
    use climacal_domain::decision::DecisionSource;
    use climacal_domain::flag::FlagKind;
    use climacal_domain::notification::NotificationKind;

    type Executor = ApplyExecutor<Arc<RecordingController>, Arc<SpyNotifier>>;

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
        }
    }

    fn executor(retry: RetryPolicy) -> (Executor, Arc<RecordingController>, Arc<SpyNotifier>) {
        let controller = Arc::new(RecordingController::default());
        let notifier = Arc::new(SpyNotifier::default());
        (
            ApplyExecutor::new(Arc::clone(&controller), Arc::clone(&notifier), retry),
            controller,
            notifier,
        )
    }

    fn apply(slot: &str, temperature: f64) -> Decision {
        Decision::Apply {
            slot_id: slot_id(slot),
            payload: ClimatePayload::temperature(temperature),
            source: DecisionSource::Flag,
        }
    }

    fn decisions(entries: &[(&str, Decision)]) -> BTreeMap<DeviceId, Decision> {
        entries
            .iter()
            .map(|(id, decision)| (device(id), decision.clone()))
            .collect()
    }

    #[test]
    fn should_double_delay_for_each_retry() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn should_apply_in_device_id_order() {
        let (exec, controller, _) = executor(fast_retry(0));
        let input = decisions(&[(OFFICE, apply("away", 15.0)), (BEDROOM, apply("away", 15.0))]);

        let report = exec.apply(&input, AppliedState::default(), false).await;

        let order: Vec<_> = controller.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![device(BEDROOM), device(OFFICE)]);
        assert_eq!(report.changed(), 2);
    }

    #[tokio::test]
    async fn should_not_call_device_when_payload_is_unchanged() {
        let (exec, controller, notifier) = executor(fast_retry(0));
        let input = decisions(&[(KITCHEN, apply("comfort", 20.0))]);

        let first = exec.apply(&input, AppliedState::default(), false).await;
        notifier.clear();
        let second = exec.apply(&input, first.state, false).await;

        assert_eq!(controller.calls_for(&device(KITCHEN)), 1);
        assert_eq!(second.results[0].status, ApplyStatus::Unchanged);
        assert!(notifier.of_kind(NotificationKind::DeviceApplied).is_empty());
        assert!(notifier.of_kind(NotificationKind::SlotChanged).is_empty());
    }

    #[tokio::test]
    async fn should_retry_and_succeed_after_transient_failure() {
        let (exec, controller, notifier) = executor(fast_retry(2));
        controller.fail(device(KITCHEN), Some(1));
        let input = decisions(&[(KITCHEN, apply("comfort", 20.0))]);

        let report = exec.apply(&input, AppliedState::default(), false).await;

        assert_eq!(report.results[0].status, ApplyStatus::Applied { attempts: 2 });
        assert_eq!(controller.calls_for(&device(KITCHEN)), 2);
        let applied = notifier.of_kind(NotificationKind::DeviceApplied);
        assert_eq!(applied[0].data["success"], true);
        assert_eq!(applied[0].data["attempts"], 2);
    }

    #[tokio::test]
    async fn should_continue_with_other_devices_when_one_exhausts_retries() {
        let (exec, controller, notifier) = executor(fast_retry(1));
        controller.fail(device(BEDROOM), None);
        let input = decisions(&[(BEDROOM, apply("away", 15.0)), (KITCHEN, apply("away", 15.0))]);

        let report = exec.apply(&input, AppliedState::default(), false).await;

        assert!(matches!(
            report.results[0].status,
            ApplyStatus::Failed { attempts: 2, .. }
        ));
        assert_eq!(report.results[1].status, ApplyStatus::Applied { attempts: 1 });
        assert!(!report.state.payloads.contains_key(&device(BEDROOM)));
        assert!(report.state.payloads.contains_key(&device(KITCHEN)));
        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = notifier
            .of_kind(NotificationKind::DeviceApplied)
            .into_iter()
            .filter(|n| n.data["success"] == false)
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].data["error"].as_str().unwrap().contains("device unavailable"));
    }

    #[tokio::test]
    async fn should_retry_failed_device_on_next_cycle() {
        let (exec, controller, _) = executor(fast_retry(0));
        controller.fail(device(KITCHEN), Some(1));
        let input = decisions(&[(KITCHEN, apply("comfort", 20.0))]);

        let first = exec.apply(&input, AppliedState::default(), false).await;
        let second = exec.apply(&input, first.state, false).await;

        assert_eq!(second.results[0].status, ApplyStatus::Applied { attempts: 1 });
        assert_eq!(controller.calls_for(&device(KITCHEN)), 2);
    }

    #[tokio::test]
    async fn should_simulate_without_device_calls_in_dry_run() {
        let (exec, controller, notifier) = executor(fast_retry(0));
        let input = decisions(&[(KITCHEN, apply("comfort", 20.0)), (OFFICE, apply("away", 15.0))]);

        let report = exec.apply(&input, AppliedState::default(), true).await;

        assert!(controller.calls().is_empty());
        assert!(
            report
                .results
                .iter()
                .all(|r| r.status == ApplyStatus::Simulated)
        );
        assert_eq!(notifier.of_kind(NotificationKind::DryRun).len(), 2);
        assert!(
            notifier
                .of_kind(NotificationKind::DeviceApplied)
                .iter()
                .all(|n| n.data["simulated"] == true)
        );
    }

    #[tokio::test]
    async fn should_track_dry_run_state_like_real_application() {
        let (dry, _, _) = executor(fast_retry(0));
        let (real, _, _) = executor(fast_retry(0));
        let input = decisions(&[(KITCHEN, apply("comfort", 20.0))]);

        let simulated = dry.apply(&input, AppliedState::default(), true).await;
        let applied = real.apply(&input, AppliedState::default(), false).await;

        assert_eq!(simulated.state, applied.state);
        let again = dry.apply(&input, simulated.state, true).await;
        assert_eq!(again.results[0].status, ApplyStatus::Unchanged);
    }

    #[tokio::test]
    async fn should_notify_skip_only_when_reason_changes() {
        let (exec, controller, notifier) = executor(fast_retry(0));
        let skip = Decision::Skip {
            reason: SkipReason::FlagSkip(FlagKind::SkipToday),
        };
        let input = decisions(&[(KITCHEN, skip)]);

        let first = exec.apply(&input, AppliedState::default(), false).await;
        let _ = exec.apply(&input, first.state, false).await;

        assert!(controller.calls().is_empty());
        assert_eq!(notifier.of_kind(NotificationKind::DeviceSkipped).len(), 1);
    }

    #[tokio::test]
    async fn should_emit_slot_changed_to_none_when_device_loses_its_slot() {
        let (exec, controller, notifier) = executor(fast_retry(0));
        let first = exec
            .apply(
                &decisions(&[(KITCHEN, apply("away", 15.0))]),
                AppliedState::default(),
                false,
            )
            .await;
        notifier.clear();

        let second = exec.apply(&BTreeMap::new(), first.state, false).await;

        assert_eq!(controller.calls().len(), 1);
        assert_eq!(second.results[0].status, ApplyStatus::Idle);
        let changed = notifier.of_kind(NotificationKind::SlotChanged);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].data["old_slot_id"], "away");
        assert!(changed[0].data["new_slot_id"].is_null());
        assert!(second.state.payloads.contains_key(&device(KITCHEN)));
    }
}
