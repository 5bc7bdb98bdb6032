//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod flag;
#[allow(clippy::missing_errors_doc)]
pub mod rules;
pub mod sse;
pub mod status;

use axum::Router;
use axum::routing::{get, post, put};

use climacal_app::ports::{DeviceController, EventSource, FlagStore};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<E, D, S>() -> Router<AppState<E, D, S>>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    Router::new()
        .route("/status", get(status::get::<E, D, S>))
        .route("/refresh", post(status::refresh::<E, D, S>))
        .route("/dry-run", put(status::set_dry_run::<E, D, S>))
        .route(
            "/flag",
            get(flag::get::<E, D, S>)
                .put(flag::set::<E, D, S>)
                .delete(flag::clear::<E, D, S>),
        )
        .route("/flag/force", post(flag::force::<E, D, S>))
        .route(
            "/rules",
            get(rules::get_rules::<E, D, S>).put(rules::replace_rules::<E, D, S>),
        )
        .route(
            "/bindings",
            get(rules::list_bindings::<E, D, S>).post(rules::create_binding::<E, D, S>),
        )
        .route(
            "/bindings/{id}",
            get(rules::get_binding::<E, D, S>)
                .put(rules::update_binding::<E, D, S>)
                .delete(rules::delete_binding::<E, D, S>),
        )
        .route("/slots", get(rules::list_slots::<E, D, S>))
        .route(
            "/slots/{id}",
            get(rules::get_slot::<E, D, S>)
                .put(rules::put_slot::<E, D, S>)
                .delete(rules::delete_slot::<E, D, S>),
        )
        .route("/notifications/stream", get(sse::stream::<E, D, S>))
}
