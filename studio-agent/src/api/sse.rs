//! Server-Sent Events for session updates

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use studio_common::sse::create_event_sse_stream;

use crate::AppState;

/// GET /studio/events
///
/// Streams history reconciliation, job progress, campaign and memory events.
pub async fn studio_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_event_sse_stream("studio-agent", &state.event_bus)
}
