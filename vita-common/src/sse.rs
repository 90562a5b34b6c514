//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementation for both vita agents: forwards the process
//! [`ActivityBus`](crate::events::ActivityBus) to connected clients with a
//! periodic heartbeat.

use crate::events::ActivityBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Create an SSE stream over an agent's activity bus
///
/// Sends an initial `ConnectionStatus` event, then forwards every activity
/// as a named SSE event with a JSON payload. A heartbeat comment goes out
/// every 15 seconds so proxies keep the connection open.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     vita_common::sse::activity_sse_stream("vita-diet", &state.activity)
/// }
/// ```
pub fn activity_sse_stream(
    service_name: &'static str,
    bus: &ActivityBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} activity stream", service_name);

    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        info!("SSE: {} activity stream started", service_name);

        // Send initial connected status
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(activity) => {
                            let activity_type = activity.activity_type();
                            match serde_json::to_string(&activity) {
                                Ok(json) => {
                                    debug!("SSE: Broadcasting activity: {}", activity_type);
                                    yield Ok(Event::default()
                                        .event(activity_type)
                                        .data(json));
                                }
                                Err(e) => {
                                    warn!("SSE: Failed to serialize activity {}: {}", activity_type, e);
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("SSE: Lagged {} activities (slow client)", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("SSE: Activity bus closed, ending stream");
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
