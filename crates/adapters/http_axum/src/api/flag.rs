//! Override flag commands.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use climacal_app::ports::{DeviceController, EventSource, FlagStore};
use climacal_domain::flag::{FlagKind, FlagState, OverrideFlag};
use climacal_domain::id::SlotId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for setting a flag.
#[derive(Deserialize)]
pub struct SetFlagRequest {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    #[serde(default)]
    pub target_slot_id: Option<SlotId>,
}

/// Request body for forcing a slot.
#[derive(Deserialize)]
pub struct ForceSlotRequest {
    pub slot_id: SlotId,
}

/// Current flag together with its state-machine view.
#[derive(Serialize)]
pub struct FlagView {
    pub state: FlagState,
    pub flag: Option<OverrideFlag>,
}

impl From<Option<OverrideFlag>> for FlagView {
    fn from(flag: Option<OverrideFlag>) -> Self {
        Self {
            state: FlagState::from(flag.as_ref()),
            flag,
        }
    }
}

/// Possible responses from the clear endpoint.
pub enum ClearResponse {
    NoContent,
}

impl IntoResponse for ClearResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/flag`
pub async fn get<E, D, S>(State(state): State<AppState<E, D, S>>) -> Json<FlagView>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Json(FlagView::from(state.coordinator.flag().await))
}

/// `PUT /api/flag`
pub async fn set<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Json(body): Json<SetFlagRequest>,
) -> Result<Json<FlagView>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let flag = state
        .coordinator
        .set_flag(body.kind, body.target_slot_id)
        .await?;
    Ok(Json(FlagView::from(Some(flag))))
}

/// `POST /api/flag/force`
pub async fn force<E, D, S>(
    State(state): State<AppState<E, D, S>>,
    Json(body): Json<ForceSlotRequest>,
) -> Result<Json<FlagView>, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let flag = state.coordinator.force_slot(body.slot_id).await?;
    Ok(Json(FlagView::from(Some(flag))))
}

/// `DELETE /api/flag`
pub async fn clear<E, D, S>(State(state): State<AppState<E, D, S>>) -> Result<ClearResponse, ApiError>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    state.coordinator.clear_flag().await?;
    Ok(ClearResponse::NoContent)
}
