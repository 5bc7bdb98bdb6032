//! Fixtures and in-memory ports shared by the unit tests of this crate.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Mutex;

use chrono::{Duration, TimeZone, Utc};

use climacal_domain::binding::Binding;
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::error::{BoxedError, ClimateError};
use climacal_domain::flag::OverrideFlag;
use climacal_domain::id::{BindingId, CalendarId, DeviceId, SlotId};
use climacal_domain::matching::{CalendarScope, MatchRule};
use climacal_domain::notification::{Notification, NotificationKind};
use climacal_domain::payload::ClimatePayload;
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::{Slot, SlotBuilder};
use climacal_domain::time::Timestamp;

use crate::ports::{DeviceController, EventSource, FlagStore, Notifier};

pub const KITCHEN: &str = "climate.kitchen";
pub const BEDROOM: &str = "climate.bedroom";
pub const OFFICE: &str = "climate.office";

pub fn device(id: &str) -> DeviceId {
    DeviceId::new(id).unwrap()
}

pub fn slot_id(id: &str) -> SlotId {
    SlotId::new(id).unwrap()
}

pub fn binding_id(id: &str) -> BindingId {
    BindingId::new(id).unwrap()
}

pub fn calendar(id: &str) -> CalendarId {
    CalendarId::new(id).unwrap()
}

/// Tuesday 2026-03-10 at `h:00` UTC.
pub fn hour(h: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap() + Duration::hours(h)
}

pub fn at(h: i64, m: i64) -> Timestamp {
    hour(h) + Duration::minutes(m)
}

pub fn event(calendar_id: &str, summary: &str, start: Timestamp, end: Timestamp) -> CalendarEvent {
    CalendarEvent::new(calendar(calendar_id), summary, start, end)
}

pub fn slot_builder(id: &str, temperature: f64) -> SlotBuilder {
    Slot::builder()
        .id(slot_id(id))
        .default_payload(ClimatePayload::temperature(temperature))
}

/// A binding over every calendar and the whole pool. Not validated.
pub fn binding(id: &str, rule: MatchRule, slot: &str, priority: i32) -> Binding {
    Binding {
        id: binding_id(id),
        calendars: CalendarScope::All,
        rule,
        target_slot_id: slot_id(slot),
        target_entities: None,
        priority,
    }
}

/// "Vacation" (priority 5, Away 15°C, every device) and "Maid Service"
/// (priority 10, Comfort 20°C, kitchen only).
pub fn scenario_rules() -> RuleSet {
    let mut maid = binding("maid", MatchRule::exact("Maid Service"), "comfort", 10);
    maid.target_entities = Some(BTreeSet::from([device(KITCHEN)]));
    RuleSet {
        bindings: vec![
            binding("vacation", MatchRule::contains("vacation"), "away", 5),
            maid,
        ],
        slots: vec![
            slot_builder("away", 15.0).build().unwrap(),
            slot_builder("comfort", 20.0).build().unwrap(),
        ],
        devices: BTreeSet::from([device(KITCHEN), device(BEDROOM), device(OFFICE)]),
    }
}

/// Calendar stub returning whatever events are stored, or failing. A
/// `delay` makes every fetch sleep before answering.
#[derive(Default)]
pub struct StaticSource {
    pub events: Mutex<Vec<CalendarEvent>>,
    pub unreachable: Mutex<bool>,
    pub delay: Mutex<Option<std::time::Duration>>,
}

impl StaticSource {
    pub fn with(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            unreachable: Mutex::new(false),
            delay: Mutex::new(None),
        }
    }

    pub fn set(&self, events: Vec<CalendarEvent>) {
        *self.events.lock().unwrap() = events;
    }
}

impl EventSource for StaticSource {
    fn fetch_active_events(
        &self,
        _now: Timestamp,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>, ClimateError>> + Send {
        let result = if *self.unreachable.lock().unwrap() {
            Err(ClimateError::EventSource("calendar offline".into()))
        } else {
            Ok(self.events.lock().unwrap().clone())
        };
        let delay = *self.delay.lock().unwrap();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }
}

/// Device stub recording every call; devices listed in `failing` error out
/// the first `failures` times they are called (or forever when `None`).
#[derive(Default)]
pub struct RecordingController {
    pub calls: Mutex<Vec<(DeviceId, ClimatePayload)>>,
    pub failing: Mutex<Vec<(DeviceId, Option<usize>)>>,
}

impl RecordingController {
    pub fn fail(&self, device_id: DeviceId, times: Option<usize>) {
        self.failing.lock().unwrap().push((device_id, times));
    }

    pub fn calls(&self) -> Vec<(DeviceId, ClimatePayload)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, device_id: &DeviceId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == device_id)
            .count()
    }
}

impl DeviceController for RecordingController {
    fn send_configuration(
        &self,
        device_id: &DeviceId,
        payload: &ClimatePayload,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        self.calls
            .lock()
            .unwrap()
            .push((device_id.clone(), payload.clone()));
        let mut failing = self.failing.lock().unwrap();
        let result = match failing.iter_mut().find(|(id, _)| id == device_id) {
            Some((_, None)) => Err(transport_error()),
            Some((_, Some(remaining))) if *remaining > 0 => {
                *remaining -= 1;
                Err(transport_error())
            }
            _ => Ok(()),
        };
        async { result }
    }
}

fn transport_error() -> ClimateError {
    let err: BoxedError = "device unavailable".into();
    ClimateError::Transport(err)
}

/// Notifier stub keeping every notification.
#[derive(Default)]
pub struct SpyNotifier {
    pub published: Mutex<Vec<Notification>>,
}

impl SpyNotifier {
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl Notifier for SpyNotifier {
    fn publish(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        self.published.lock().unwrap().push(notification);
        async { Ok(()) }
    }
}

/// Flag store stub.
#[derive(Default)]
pub struct InMemoryFlagStore {
    pub flag: Mutex<Option<OverrideFlag>>,
    pub broken: Mutex<bool>,
}

impl FlagStore for InMemoryFlagStore {
    fn load(&self) -> impl Future<Output = Result<Option<OverrideFlag>, ClimateError>> + Send {
        let flag = self.flag.lock().unwrap().clone();
        async { Ok(flag) }
    }

    fn save(
        &self,
        flag: Option<OverrideFlag>,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        let result = if *self.broken.lock().unwrap() {
            Err(ClimateError::Storage("disk full".into()))
        } else {
            *self.flag.lock().unwrap() = flag;
            Ok(())
        };
        async { result }
    }
}
