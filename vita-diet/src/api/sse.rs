//! Server-Sent Events for agent activity

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - SSE stream of this agent's activity
///
/// Streams envelope publishes/receipts and completed analyses.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    vita_common::sse::activity_sse_stream("vita-diet", &state.activity)
}
