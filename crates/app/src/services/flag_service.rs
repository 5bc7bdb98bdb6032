//! Flag service: use-cases for the single global override flag.
//!
//! The service owns the in-memory copy of the flag and writes through to the
//! [`FlagStore`] on every change. It is independent from the evaluation
//! cycle: a flag set while a cycle runs takes effect on the next one.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use climacal_domain::error::ClimateError;
use climacal_domain::flag::{ClearReason, FlagKind, OverrideFlag};
use climacal_domain::id::{DeviceId, SlotId};
use climacal_domain::notification::Notification;
use climacal_domain::time::now;

use crate::ports::{FlagStore, Notifier};

/// Application service managing the override flag.
pub struct FlagService<S, N> {
    store: S,
    notifier: N,
    current: Mutex<Option<OverrideFlag>>,
}

impl<S, N> FlagService<S, N>
where
    S: FlagStore + Send + Sync,
    N: Notifier + Send + Sync,
{
    /// Create a service with no active flag. Call [`restore`](Self::restore)
    /// to pick up a persisted one.
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            current: Mutex::new(None),
        }
    }

    /// Load the persisted flag into memory.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the [`FlagStore`].
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<OverrideFlag>, ClimateError> {
        let flag = self.store.load().await?;
        if let Some(flag) = &flag {
            tracing::info!(kind = %flag.kind, "restored override flag");
        }
        *self.current.lock().await = flag.clone();
        Ok(flag)
    }

    /// Snapshot of the active flag.
    pub async fn current(&self) -> Option<OverrideFlag> {
        self.current.lock().await.clone()
    }

    /// Set a flag, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Validation`] for `force_slot` without a
    /// target, or a storage error (the previous flag then stays active).
    #[tracing::instrument(skip(self, baseline))]
    pub async fn set(
        &self,
        kind: FlagKind,
        target_slot_id: Option<SlotId>,
        baseline: BTreeMap<DeviceId, SlotId>,
    ) -> Result<OverrideFlag, ClimateError> {
        let flag = OverrideFlag::new(kind, target_slot_id, now(), baseline)?;
        let mut current = self.current.lock().await;
        self.store.save(Some(flag.clone())).await?;
        let previous = current.replace(flag.clone());
        drop(current);

        if let Some(previous) = previous {
            self.notify(Notification::flag_cleared(&previous, ClearReason::Replaced))
                .await;
        }
        tracing::info!(kind = %flag.kind, target = ?flag.target_slot_id, "override flag set");
        self.notify(Notification::flag_set(&flag)).await;
        Ok(flag)
    }

    /// Clear the active flag, returning it.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the [`FlagStore`].
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) -> Result<Option<OverrideFlag>, ClimateError> {
        let mut current = self.current.lock().await;
        if current.is_none() {
            return Ok(None);
        }
        self.store.save(None).await?;
        let previous = current.take();
        drop(current);

        if let Some(previous) = &previous {
            tracing::info!(kind = %previous.kind, "override flag cleared");
            self.notify(Notification::flag_cleared(previous, ClearReason::Manual))
                .await;
        }
        Ok(previous)
    }

    /// Clear the flag only if it is still `expected`. Returns whether it was
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the [`FlagStore`].
    pub async fn clear_if_current(
        &self,
        expected: &OverrideFlag,
        reason: ClearReason,
    ) -> Result<bool, ClimateError> {
        let mut current = self.current.lock().await;
        if current.as_ref() != Some(expected) {
            return Ok(false);
        }
        self.store.save(None).await?;
        *current = None;
        drop(current);

        tracing::info!(kind = %expected.kind, %reason, "override flag expired");
        self.notify(Notification::flag_cleared(expected, reason))
            .await;
        Ok(true)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.publish(notification).await {
            tracing::warn!(%err, "failed to publish notification");
        }
    }
}
