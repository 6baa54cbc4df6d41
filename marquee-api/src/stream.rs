use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/showings/{id}/stream", get(seat_lock_stream))
}

/// GET /v1/showings/{id}/stream
///
/// Server-sent events for clients watching a showing's seat map. Each event
/// carries the seat-instance ids that were just locked; other showings'
/// events are filtered out. A subscriber that lags behind the broadcast
/// buffer misses events and should reload the seat map.
async fn seat_lock_stream(
    State(state): State<AppState>,
    Path(showing_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    authenticate(&state.auth, bearer.token())?;

    let rx = state.sse_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.showing_id == showing_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event("seats_locked").data(data)))
            }
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
