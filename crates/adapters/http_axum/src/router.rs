//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use climacal_app::ports::{DeviceController, EventSource, FlagStore};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// API routes live under `/api`. A [`TraceLayer`] logs each HTTP
/// request/response at the `DEBUG` level.
pub fn build<E, D, S>(state: AppState<E, D, S>) -> Router
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
