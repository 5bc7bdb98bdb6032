//! In-memory ports and a wired state for handler tests.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use climacal_app::coordinator::{Coordinator, CoordinatorSettings};
use climacal_app::notification_bus::InProcessNotificationBus;
use climacal_app::ports::{DeviceController, EventSource, FlagStore};
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::error::ClimateError;
use climacal_domain::flag::OverrideFlag;
use climacal_domain::id::{DeviceId, SlotId};
use climacal_domain::payload::ClimatePayload;
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::Slot;
use climacal_domain::time::Timestamp;

use crate::state::AppState;

pub struct EmptyCalendar;

impl EventSource for EmptyCalendar {
    async fn fetch_active_events(&self, _now: Timestamp) -> Result<Vec<CalendarEvent>, ClimateError> {
        Ok(vec![])
    }
}

pub struct AcceptingController;

impl DeviceController for AcceptingController {
    async fn send_configuration(
        &self,
        _device_id: &DeviceId,
        _payload: &ClimatePayload,
    ) -> Result<(), ClimateError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFlagStore {
    flag: Mutex<Option<OverrideFlag>>,
}

impl FlagStore for MemoryFlagStore {
    async fn load(&self) -> Result<Option<OverrideFlag>, ClimateError> {
        Ok(self.flag.lock().unwrap().clone())
    }

    async fn save(&self, flag: Option<OverrideFlag>) -> Result<(), ClimateError> {
        *self.flag.lock().unwrap() = flag;
        Ok(())
    }
}

pub type TestState = AppState<EmptyCalendar, AcceptingController, MemoryFlagStore>;

/// One "comfort" slot and two devices, real-apply mode.
pub fn test_state() -> (TestState, Arc<InProcessNotificationBus>) {
    let rules = RuleSet {
        bindings: vec![],
        slots: vec![
            Slot::builder()
                .id(SlotId::new("comfort").unwrap())
                .default_payload(ClimatePayload::temperature(20.0))
                .build()
                .unwrap(),
        ],
        devices: BTreeSet::from([
            DeviceId::new("climate.kitchen").unwrap(),
            DeviceId::new("climate.bedroom").unwrap(),
        ]),
    };
    let bus = Arc::new(InProcessNotificationBus::new(16));
    let coordinator = Coordinator::new(
        EmptyCalendar,
        AcceptingController,
        MemoryFlagStore::default(),
        Arc::clone(&bus),
        rules,
        CoordinatorSettings {
            dry_run: false,
            ..CoordinatorSettings::default()
        },
    )
    .unwrap();
    (AppState::new(Arc::new(coordinator), Arc::clone(&bus)), bus)
}

/// Send one request and decode the JSON body (`Null` when empty).
pub async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
