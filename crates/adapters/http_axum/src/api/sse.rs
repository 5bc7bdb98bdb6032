//! Server-Sent Events (SSE) stream of notifications.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use climacal_app::ports::{DeviceController, EventSource, FlagStore};

use crate::state::AppState;

/// `GET /api/notifications/stream`
///
/// Each notification is sent as a JSON `data:` frame, with its kind as the
/// SSE event name. The stream ends when the client disconnects.
pub async fn stream<E, D, S>(
    State(state): State<AppState<E, D, S>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    E: EventSource + Send + Sync + 'static,
    D: DeviceController + Send + Sync + 'static,
    S: FlagStore + Send + Sync + 'static,
{
    let receiver = state.notifications.subscribe();
    let events = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(notification) => match serde_json::to_string(&notification) {
            Ok(json) => Some(Ok(Event::default()
                .event(notification.kind.as_str())
                .data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize notification for SSE stream");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some notifications were dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
