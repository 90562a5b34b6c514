//! vita-fit library interface
//!
//! The fitness agent: workout and step logging with MET-based energy
//! estimation, daily activity tracking, and cross-agent fitness events.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod workout;

pub use crate::error::{ApiError, ApiResult};

use crate::config::FitConfig;
use crate::ledger::ActivityLedger;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;
use vita_common::channel::{ChannelDirection, MessageChannel};
use vita_common::envelope::{EnvelopeBuilder, FitnessSummary, SummaryCard};
use vita_common::events::{ActivityBus, AgentActivity, AgentSource, FitnessEvent, Priority};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Agent configuration
    pub config: Arc<FitConfig>,
    /// Durable cross-agent channel
    pub channel: MessageChannel,
    /// In-process activity bus for SSE
    pub activity: ActivityBus,
    /// Per-user daily activity state
    pub ledger: Arc<ActivityLedger>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: FitConfig, channel: MessageChannel) -> Self {
        Self {
            config: Arc::new(config),
            channel,
            activity: ActivityBus::new(256),
            ledger: Arc::new(ActivityLedger::new()),
            startup_time: Utc::now(),
        }
    }

    /// Build and publish a fitness event, reporting the outcome on the
    /// activity bus
    pub async fn publish_fitness_event(
        &self,
        event: FitnessEvent,
        user_id: &str,
        card: FitnessSummary,
        priority: Priority,
    ) -> bool {
        let builder = EnvelopeBuilder::new(AgentSource::FitnessAgent).with_priority(priority);
        let envelope = match builder.build(event.as_str(), user_id, SummaryCard::Fitness(card)) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(event = %event, error = %e, "Envelope build failed, event not published");
                return false;
            }
        };

        if self.channel.publish(&envelope).await {
            self.activity.emit_lossy(AgentActivity::EnvelopePublished {
                event_name: envelope.event_name.clone(),
                user_id: envelope.user_id.clone(),
                queue: ChannelDirection::for_publisher(AgentSource::FitnessAgent)
                    .queue_name()
                    .to_string(),
                timestamp: Utc::now(),
            });
            true
        } else {
            self.activity.emit_lossy(AgentActivity::PublishFailed {
                event_name: envelope.event_name.clone(),
                user_id: envelope.user_id.clone(),
                timestamp: Utc::now(),
            });
            false
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::workout_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
