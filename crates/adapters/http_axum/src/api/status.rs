//! Coordinator status and cycle control.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use climacal_app::coordinator::CoordinatorStatus;
use climacal_app::ports::{DeviceController, EventSource, FlagStore};

use crate::state::AppState;

/// Request body for toggling dry run.
#[derive(Deserialize)]
pub struct DryRunRequest {
    pub enabled: bool,
}

/// `GET /api/status`
pub async fn get<E, D, S>(State(state): State<AppState<E, D, S>>) -> Json<CoordinatorStatus>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Json(state.coordinator.status().await)
}

/// `POST /api/refresh`: request an immediate evaluation cycle.
pub async fn refresh<E, D, S>(State(state): State<AppState<E, D, S>>) -> Response
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    state.coordinator.refresh_now();
    StatusCode::ACCEPTED.into_response()
}

/// `PUT /api/dry-run`
pub async fn set_dry_run<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Json(body): Json<DryRunRequest>,
) -> Json<CoordinatorStatus>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    state.coordinator.set_dry_run(body.enabled);
    Json(state.coordinator.status().await)
}
