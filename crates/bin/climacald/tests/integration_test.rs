//! End-to-end tests for the full climacald stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, virtual
//! calendar and thermostats, real coordinator, real axum router) and
//! exercises it through the HTTP layer via `tower::ServiceExt::oneshot`;
//! no TCP port is bound. Cycles are driven explicitly with
//! `run_cycle_at` instead of the poll loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use climacal_adapter_http_axum::router;
use climacal_adapter_http_axum::state::{AppState, SharedCoordinator};
use climacal_adapter_storage_sqlite_sqlx::{Config, SqliteFlagStore};
use climacal_adapter_virtual::{VirtualCalendar, VirtualThermostats};
use climacal_app::coordinator::{Coordinator, CoordinatorSettings};
use climacal_app::notification_bus::InProcessNotificationBus;
use climacal_app::ports::FlagStore;
use climacal_domain::binding::Binding;
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::flag::FlagKind;
use climacal_domain::id::{BindingId, CalendarId, DeviceId, SlotId};
use climacal_domain::matching::MatchRule;
use climacal_domain::payload::ClimatePayload;
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::Slot;
use climacal_domain::time::Timestamp;

const KITCHEN: &str = "climate.kitchen";
const BEDROOM: &str = "climate.bedroom";
const OFFICE: &str = "climate.office";

type Stack = SharedCoordinator<Arc<VirtualCalendar>, Arc<VirtualThermostats>, SqliteFlagStore>;

struct Harness {
    app: axum::Router,
    coordinator: Arc<Stack>,
    calendar: Arc<VirtualCalendar>,
    thermostats: Arc<VirtualThermostats>,
    /// Second handle on the same database, to observe persistence.
    store: SqliteFlagStore,
    now: Timestamp,
}

fn device(id: &str) -> DeviceId {
    DeviceId::new(id).unwrap()
}

fn slot(id: &str, temperature: f64) -> Slot {
    Slot::builder()
        .id(SlotId::new(id).unwrap())
        .default_payload(ClimatePayload::temperature(temperature))
        .build()
        .unwrap()
}

fn rules() -> RuleSet {
    RuleSet {
        bindings: vec![
            Binding::builder()
                .id(BindingId::new("vacation").unwrap())
                .rule(MatchRule::contains("vacation"))
                .slot(SlotId::new("away").unwrap())
                .priority(5)
                .build()
                .unwrap(),
            Binding::builder()
                .id(BindingId::new("maid").unwrap())
                .rule(MatchRule::exact("Maid Service"))
                .slot(SlotId::new("comfort").unwrap())
                .target(device(KITCHEN))
                .priority(10)
                .build()
                .unwrap(),
        ],
        slots: vec![slot("away", 15.0), slot("comfort", 20.0)],
        devices: BTreeSet::from([device(KITCHEN), device(BEDROOM), device(OFFICE)]),
    }
}

fn event(summary: &str, start: Timestamp, end: Timestamp) -> CalendarEvent {
    CalendarEvent::new(CalendarId::new("calendar.home").unwrap(), summary, start, end)
}

/// Vacation spans several days; the maid visit covers `now` only.
async fn harness() -> Harness {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");

    let now = Utc::now();
    let calendar = Arc::new(VirtualCalendar::new(vec![
        event("Vacation", now - Duration::hours(1), now + Duration::days(3)),
        event("Maid Service", now - Duration::hours(1), now + Duration::hours(2)),
    ]));
    let thermostats = Arc::new(VirtualThermostats::new([
        device(KITCHEN),
        device(BEDROOM),
        device(OFFICE),
    ]));
    let bus = Arc::new(InProcessNotificationBus::new(256));
    let coordinator = Arc::new(
        Coordinator::new(
            Arc::clone(&calendar),
            Arc::clone(&thermostats),
            db.flag_store(),
            Arc::clone(&bus),
            rules(),
            CoordinatorSettings {
                dry_run: false,
                ..CoordinatorSettings::default()
            },
        )
        .unwrap(),
    );
    let app = router::build(AppState::new(Arc::clone(&coordinator), bus));

    Harness {
        app,
        coordinator,
        calendar,
        thermostats,
        store: db.flag_store(),
        now,
    }
}

async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn temperature(harness: &Harness, id: &str) -> Option<f64> {
    harness.thermostats.state(&device(id)).and_then(|state| state.temperature)
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let harness = harness().await;
    let (status, _) = call(&harness.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_apply_highest_priority_slot_per_device() {
    let harness = harness().await;

    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    assert_eq!(temperature(&harness, KITCHEN), Some(20.0));
    assert_eq!(temperature(&harness, BEDROOM), Some(15.0));
    assert_eq!(temperature(&harness, OFFICE), Some(15.0));
}

#[tokio::test]
async fn should_expose_last_cycle_in_status() {
    let harness = harness().await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    let (status, json) = call(&harness.app, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dry_run"], false);
    assert_eq!(json["bindings"], 2);
    assert_eq!(json["last_cycle"]["active_events"], 2);
    assert_eq!(json["last_cycle"]["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn should_not_resend_unchanged_payload_on_next_cycle() {
    let harness = harness().await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();
    let before = harness.thermostats.history(&device(KITCHEN)).len();

    harness
        .coordinator
        .run_cycle_at(harness.now + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(harness.thermostats.history(&device(KITCHEN)).len(), before);
}

#[tokio::test]
async fn should_keep_devices_untouched_when_calendar_is_unreachable() {
    let harness = harness().await;
    harness.calendar.set_reachable(false);

    assert!(harness.coordinator.run_cycle_at(harness.now).await.is_err());
    assert_eq!(temperature(&harness, KITCHEN), None);
}

// ---------------------------------------------------------------------------
// Override flags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_force_slot_through_api_and_persist_it() {
    let harness = harness().await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    let (status, json) = call(
        &harness.app,
        "POST",
        "/api/flag/force",
        Some(r#"{"slot_id":"comfort"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["slot_id"], "comfort");

    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    assert_eq!(temperature(&harness, BEDROOM), Some(20.0));
    assert_eq!(temperature(&harness, OFFICE), Some(20.0));
    let persisted = harness.store.load().await.unwrap().unwrap();
    assert_eq!(persisted.kind, FlagKind::ForceSlot);
    assert_eq!(persisted.target_slot_id, Some(SlotId::new("comfort").unwrap()));
}

#[tokio::test]
async fn should_skip_today_and_resume_the_next_day() {
    let harness = harness().await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    let (status, _) = call(
        &harness.app,
        "PUT",
        "/api/flag",
        Some(r#"{"type":"skip_today"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The maid visit is over: the kitchen would go back to the vacation slot.
    harness
        .calendar
        .replace_events(vec![event(
            "Vacation",
            harness.now - Duration::hours(1),
            harness.now + Duration::days(3),
        )])
        .await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();
    assert_eq!(temperature(&harness, KITCHEN), Some(20.0));

    harness
        .coordinator
        .run_cycle_at(harness.now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(temperature(&harness, KITCHEN), Some(15.0));
    assert!(harness.coordinator.flag().await.is_none());
    assert!(harness.store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn should_return_not_found_when_forcing_unknown_slot() {
    let harness = harness().await;
    let (status, json) = call(
        &harness.app,
        "POST",
        "/api/flag/force",
        Some(r#"{"slot_id":"party"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("party"));
}

#[tokio::test]
async fn should_clear_flag_through_api() {
    let harness = harness().await;
    call(
        &harness.app,
        "PUT",
        "/api/flag",
        Some(r#"{"type":"skip_until_next_slot"}"#),
    )
    .await;

    let (status, _) = call(&harness.app, "DELETE", "/api/flag", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = call(&harness.app, "GET", "/api/flag", None).await;
    assert_eq!(json["state"]["state"], "none");
    assert!(harness.store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn should_restore_persisted_flag_on_restart() {
    let harness = harness().await;
    harness
        .coordinator
        .force_slot(SlotId::new("away").unwrap())
        .await
        .unwrap();

    let restored = Coordinator::new(
        Arc::clone(&harness.calendar),
        Arc::clone(&harness.thermostats),
        harness.store,
        Arc::new(InProcessNotificationBus::new(16)),
        rules(),
        CoordinatorSettings::default(),
    )
    .unwrap();
    let flag = restored.restore_flag().await.unwrap().unwrap();

    assert_eq!(flag.target_slot_id, Some(SlotId::new("away").unwrap()));
}

// ---------------------------------------------------------------------------
// Rule management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_apply_binding_edited_through_api_on_next_cycle() {
    let harness = harness().await;
    harness.coordinator.run_cycle_at(harness.now).await.unwrap();
    assert_eq!(temperature(&harness, KITCHEN), Some(20.0));

    let (status, _) = call(
        &harness.app,
        "PUT",
        "/api/bindings/maid",
        Some(
            r#"{
                "id": "maid",
                "match": {"type": "exact", "value": "Window Cleaning"},
                "target_slot_id": "comfort",
                "target_entities": ["climate.kitchen"],
                "priority": 10
            }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    harness
        .coordinator
        .run_cycle_at(harness.now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(temperature(&harness, KITCHEN), Some(15.0));
}

#[tokio::test]
async fn should_apply_new_slot_and_binding_created_through_api() {
    let harness = harness().await;
    let (status, _) = call(
        &harness.app,
        "PUT",
        "/api/slots/eco",
        Some(r#"{"id": "eco", "label": "Eco", "default_payload": {"temperature": 17.5}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &harness.app,
        "POST",
        "/api/bindings",
        Some(
            r#"{
                "id": "vacation-eco",
                "match": {"type": "regex", "value": "Vac"},
                "target_slot_id": "eco",
                "target_entities": ["climate.bedroom"],
                "priority": 20
            }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    harness.coordinator.run_cycle_at(harness.now).await.unwrap();

    assert_eq!(temperature(&harness, BEDROOM), Some(17.5));
    assert_eq!(temperature(&harness, OFFICE), Some(15.0));
    assert_eq!(temperature(&harness, KITCHEN), Some(20.0));
}
