//! vita-diet library interface
//!
//! The diet agent: detect → fuse → resolve meal analysis, daily nutrition
//! tracking, and cross-agent diet events.

pub mod analysis;
pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod fusion;
pub mod handlers;
pub mod ledger;
pub mod nutrition;

pub use crate::error::{ApiError, ApiResult};

use crate::analysis::MealAnalyzer;
use crate::config::DietConfig;
use crate::detect::keyword::{KeywordDetector, PatternDetector};
use crate::detect::ocr::OcrDetector;
use crate::detect::vision::VisionDetector;
use crate::detect::{DetectorAdapter, DetectorSet};
use crate::fusion::matching::AliasTable;
use crate::fusion::FusionEngine;
use crate::ledger::DailyLedger;
use crate::nutrition::resolver::NutritionResolver;
use crate::nutrition::NutritionTable;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::warn;
use vita_common::channel::{ChannelDirection, MessageChannel};
use vita_common::envelope::{DietSummary, EnvelopeBuilder, SummaryCard};
use vita_common::events::{ActivityBus, AgentActivity, AgentSource, DietEvent, Priority};

/// Application state shared across handlers
///
/// Everything here is either immutable after startup (config, tables,
/// engines) or owns its own synchronization (channel, ledger, bus). No
/// hidden process-wide state.
#[derive(Clone)]
pub struct AppState {
    /// Agent configuration
    pub config: Arc<DietConfig>,
    /// Detect → fuse → resolve pipeline
    pub analyzer: Arc<MealAnalyzer>,
    /// Detector set, exposed for health reporting
    pub detectors: Arc<DetectorSet>,
    /// Durable cross-agent channel
    pub channel: MessageChannel,
    /// In-process activity bus for SSE
    pub activity: ActivityBus,
    /// Per-user daily nutrition state
    pub ledger: Arc<DailyLedger>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build and publish a diet event, reporting the outcome on the
    /// activity bus
    ///
    /// A failed publish leaves the agent fully operational (degraded
    /// cross-notification); a failed build is a programming error on the
    /// calling path and is logged, never panicked on.
    pub async fn publish_diet_event(
        &self,
        event: DietEvent,
        user_id: &str,
        card: DietSummary,
        priority: Priority,
    ) -> bool {
        let builder = EnvelopeBuilder::new(AgentSource::DietAgent).with_priority(priority);
        let envelope = match builder.build(event.as_str(), user_id, SummaryCard::Diet(card)) {
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
                queue: ChannelDirection::for_publisher(AgentSource::DietAgent)
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

/// Assemble the full agent state from configuration
///
/// Tables and engines load once here and are immutable afterwards; requests
/// share them through `Arc` without locking.
pub fn build_state(config: DietConfig, channel: MessageChannel) -> vita_common::Result<AppState> {
    let config = Arc::new(config);

    let table = Arc::new(NutritionTable::load(
        config.nutrition.table_path.as_deref(),
    )?);

    // Fusion aliases: nutrition-table aliases plus operator overrides
    let mut alias_pairs = table.alias_pairs();
    alias_pairs.extend(
        config
            .fusion
            .aliases
            .iter()
            .map(|(alias, canonical)| (alias.clone(), canonical.clone())),
    );
    let aliases = AliasTable::new(alias_pairs);

    let lexicon = Arc::new(table.lexicon());
    let timeout = Duration::from_millis(config.detectors.timeout_ms);

    let adapters: Vec<Arc<dyn DetectorAdapter>> = vec![
        Arc::new(VisionDetector::new(
            config.detectors.vision_endpoint.clone(),
            timeout,
        )),
        Arc::new(OcrDetector::new(
            config.detectors.ocr_endpoint.clone(),
            lexicon.clone(),
            timeout,
        )),
        Arc::new(KeywordDetector::new(lexicon.clone())),
        Arc::new(PatternDetector::new(lexicon)),
    ];
    let detectors = Arc::new(DetectorSet::new(adapters, timeout));

    let fusion = FusionEngine::new(
        config.detectors.weights.clone(),
        aliases,
        config.fusion.token_overlap_threshold,
        config.fusion.top_k,
    );
    let resolver = NutritionResolver::new(
        table,
        config.nutrition.portions.clone(),
        config.nutrition.cooking.clone(),
        config.fusion.token_overlap_threshold,
    );
    let analyzer = Arc::new(MealAnalyzer::new(detectors.clone(), fusion, resolver));

    Ok(AppState {
        config,
        analyzer,
        detectors,
        channel,
        activity: ActivityBus::new(256),
        ledger: Arc::new(DailyLedger::new()),
        startup_time: Utc::now(),
    })
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::meal_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
