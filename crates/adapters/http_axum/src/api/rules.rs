//! Rule set management: bindings and slots.
//!
//! Every write goes through [`Coordinator::update_rules`], so the edited set
//! is validated as a whole before it replaces the running one.
//!
//! [`Coordinator::update_rules`]: climacal_app::coordinator::Coordinator::update_rules

use std::fmt::Display;
use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use climacal_app::ports::{DeviceController, EventSource, FlagStore};
use climacal_domain::binding::Binding;
use climacal_domain::error::{ClimateError, NotFoundError, ValidationError};
use climacal_domain::id::{BindingId, CalendarId, SlotId};
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::Slot;

use crate::error::ApiError;
use crate::state::AppState;

/// Query of the binding list endpoint.
#[derive(Deserialize)]
pub struct BindingFilter {
    /// Only bindings listening to this calendar.
    pub calendar_id: Option<CalendarId>,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Binding>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoints.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = ValidationError>,
{
    T::from_str(raw).map_err(|err| ApiError::from(ClimateError::from(err)))
}

fn ensure_same_id<T: Display + PartialEq>(kind: &'static str, path: &T, body: &T) -> Result<(), ApiError> {
    if path == body {
        return Ok(());
    }
    Err(ApiError::from(ClimateError::from(ValidationError::IdMismatch {
        kind,
        path: path.to_string(),
        body: body.to_string(),
    })))
}

fn not_found(entity: &'static str, id: impl Display) -> ApiError {
    ApiError::from(ClimateError::from(NotFoundError {
        entity,
        id: id.to_string(),
    }))
}

/// `GET /api/rules`
pub async fn get_rules<E, D, S>(State(state): State<AppState<E, D, S>>) -> Json<RuleSet>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Json(state.coordinator.rules().await)
}

/// `PUT /api/rules`
pub async fn replace_rules<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Json(rules): Json<RuleSet>,
) -> Result<Json<RuleSet>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    state.coordinator.replace_rules(rules).await?;
    Ok(Json(state.coordinator.rules().await))
}

/// `GET /api/bindings`
pub async fn list_bindings<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Query(filter): Query<BindingFilter>,
) -> Json<Vec<Binding>>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let rules = state.coordinator.rules().await;
    let bindings = match &filter.calendar_id {
        Some(calendar_id) => rules.bindings_for_calendar(calendar_id).cloned().collect(),
        None => rules.bindings,
    };
    Json(bindings)
}

/// `GET /api/bindings/{id}`
pub async fn get_binding<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
) -> Result<Json<Binding>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: BindingId = parse_id(&id)?;
    let rules = state.coordinator.rules().await;
    rules
        .binding(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Binding", &id))
}

/// `POST /api/bindings`
pub async fn create_binding<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Json(binding): Json<Binding>,
) -> Result<CreateResponse, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let created = binding.clone();
    state
        .coordinator
        .update_rules(move |rules| rules.add_binding(binding))
        .await?;
    tracing::info!(binding = %created.id, "binding created");
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/bindings/{id}`
pub async fn update_binding<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
    Json(binding): Json<Binding>,
) -> Result<Json<Binding>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: BindingId = parse_id(&id)?;
    ensure_same_id("binding", &id, &binding.id)?;
    let updated = binding.clone();
    state
        .coordinator
        .update_rules(move |rules| rules.update_binding(binding))
        .await?;
    tracing::info!(binding = %id, "binding updated");
    Ok(Json(updated))
}

/// `DELETE /api/bindings/{id}`
pub async fn delete_binding<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: BindingId = parse_id(&id)?;
    state
        .coordinator
        .update_rules(|rules| rules.remove_binding(&id))
        .await?;
    tracing::info!(binding = %id, "binding deleted");
    Ok(DeleteResponse::NoContent)
}

/// `GET /api/slots`
pub async fn list_slots<E, D, S>(State(state): State<AppState<E, D, S>>) -> Json<Vec<Slot>>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Json(state.coordinator.rules().await.slots)
}

/// `GET /api/slots/{id}`
pub async fn get_slot<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
) -> Result<Json<Slot>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: SlotId = parse_id(&id)?;
    let rules = state.coordinator.rules().await;
    rules
        .slot(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Slot", &id))
}

/// `PUT /api/slots/{id}`: create or replace.
pub async fn put_slot<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
    Json(slot): Json<Slot>,
) -> Result<Json<Slot>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: SlotId = parse_id(&id)?;
    ensure_same_id("slot", &id, &slot.id)?;
    let stored = slot.clone();
    state
        .coordinator
        .update_rules(move |rules| rules.upsert_slot(slot))
        .await?;
    tracing::info!(slot = %id, "slot stored");
    Ok(Json(stored))
}

/// `DELETE /api/slots/{id}`
pub async fn delete_slot<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let id: SlotId = parse_id(&id)?;
    state
        .coordinator
        .update_rules(|rules| rules.remove_slot(&id))
        .await?;
    tracing::info!(slot = %id, "slot deleted");
    Ok(DeleteResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::router::build;
    use crate::test_support::{send, test_state};

    const GYM: &str = r#"{
        "id": "gym",
        "calendars": ["calendar.work"],
        "match": {"type": "contains", "value": "gym"},
        "target_slot_id": "comfort",
        "priority": 3
    }"#;

    const AWAY: &str = r#"{
        "id": "away",
        "label": "Away",
        "default_payload": {"temperature": 15.0}
    }"#;

    #[tokio::test]
    async fn should_create_binding_and_filter_by_calendar() {
        let (state, _) = test_state();

        let (status, json) = send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"], "gym");

        let (_, work) = send(
            build(state.clone()),
            "GET",
            "/api/bindings?calendar_id=calendar.work",
            None,
        )
        .await;
        let (_, home) = send(
            build(state),
            "GET",
            "/api/bindings?calendar_id=calendar.home",
            None,
        )
        .await;
        assert_eq!(work.as_array().unwrap().len(), 1);
        assert!(home.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_reject_duplicate_binding() {
        let (state, _) = test_state();
        send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;

        let (status, json) = send(build(state), "POST", "/api/bindings", Some(GYM)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn should_reject_binding_targeting_unknown_slot() {
        let (state, _) = test_state();
        let body = GYM.replace(r#""comfort""#, r#""sauna""#);

        let (status, _) = send(build(state.clone()), "POST", "/api/bindings", Some(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.coordinator.rules().await.bindings.is_empty());
    }

    #[tokio::test]
    async fn should_reject_binding_with_invalid_regex() {
        let (state, _) = test_state();
        let body = GYM.replace(
            r#"{"type": "contains", "value": "gym"}"#,
            r#"{"type": "regex", "value": "(gym"}"#,
        );

        let (status, json) = send(build(state), "POST", "/api/bindings", Some(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("regex"));
    }

    #[tokio::test]
    async fn should_update_binding_in_place() {
        let (state, _) = test_state();
        send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;
        let body = GYM.replace(r#""priority": 3"#, r#""priority": 9"#);

        let (status, json) = send(build(state.clone()), "PUT", "/api/bindings/gym", Some(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["priority"], 9);
        let (_, stored) = send(build(state), "GET", "/api/bindings/gym", None).await;
        assert_eq!(stored["priority"], 9);
    }

    #[tokio::test]
    async fn should_reject_update_when_ids_differ() {
        let (state, _) = test_state();
        send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;

        let (status, json) = send(build(state), "PUT", "/api/bindings/pool", Some(GYM)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("does not match"));
    }

    #[tokio::test]
    async fn should_delete_binding() {
        let (state, _) = test_state();
        send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;

        let (status, _) = send(build(state.clone()), "DELETE", "/api/bindings/gym", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(build(state), "GET", "/api/bindings/gym", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_unknown_binding() {
        let (state, _) = test_state();
        let (status, _) = send(build(state), "DELETE", "/api/bindings/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_create_then_replace_slot() {
        let (state, _) = test_state();

        let (status, _) = send(build(state.clone()), "PUT", "/api/slots/away", Some(AWAY)).await;
        assert_eq!(status, StatusCode::OK);
        let colder = AWAY.replace("15.0", "12.0");
        send(build(state.clone()), "PUT", "/api/slots/away", Some(&colder)).await;

        let (_, slots) = send(build(state.clone()), "GET", "/api/slots", None).await;
        assert_eq!(slots.as_array().unwrap().len(), 2);
        let (_, away) = send(build(state), "GET", "/api/slots/away", None).await;
        assert_eq!(away["default_payload"]["temperature"], 12.0);
    }

    #[tokio::test]
    async fn should_reject_slot_with_out_of_range_payload() {
        let (state, _) = test_state();
        let body = AWAY.replace("15.0", "90.0");

        let (status, _) = send(build(state), "PUT", "/api/slots/away", Some(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_refuse_to_delete_slot_still_in_use() {
        let (state, _) = test_state();
        send(build(state.clone()), "POST", "/api/bindings", Some(GYM)).await;

        let (status, json) = send(build(state.clone()), "DELETE", "/api/slots/comfort", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("gym"));
        assert_eq!(state.coordinator.rules().await.slots.len(), 1);
    }

    #[tokio::test]
    async fn should_replace_whole_rule_set() {
        let (state, _) = test_state();
        let body = format!(
            r#"{{"slots": [{AWAY}], "bindings": [], "devices": ["climate.kitchen"]}}"#
        );

        let (status, json) = send(build(state.clone()), "PUT", "/api/rules", Some(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["slots"][0]["id"], "away");
        assert_eq!(state.coordinator.rules().await.devices.len(), 1);
    }
}
