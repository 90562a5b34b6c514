//! End-to-end channel tests: publish on one side, dispatch on the other,
//! including redelivery across a store restart.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use vita_common::channel::{ChannelDirection, MessageChannel};
use vita_common::dispatcher::{ConsumerDispatcher, EventHandler};
use vita_common::envelope::{
    DietSummary, EnvelopeBuilder, EventEnvelope, FitnessSummary, SummaryCard,
};
use vita_common::events::AgentSource;
use vita_common::Result;

/// Idempotent handler: records dedup keys into a set
struct RecordingHandler {
    seen: Mutex<HashSet<String>>,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(HashSet::new()),
        })
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        self.seen.lock().await.insert(envelope.dedup_key());
        Ok(())
    }
}

fn workout_envelope(user: &str) -> EventEnvelope {
    EnvelopeBuilder::new(AgentSource::FitnessAgent)
        .build(
            "workout_completed",
            user,
            SummaryCard::Fitness(FitnessSummary {
                calories_burned: 310.0,
                workout_type: Some("running".to_string()),
                duration_minutes: Some(30.0),
                ..Default::default()
            }),
        )
        .unwrap()
}

#[tokio::test]
async fn fitness_event_reaches_diet_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let channel = MessageChannel::connect(dir.path().join("channel.db")).await;

    // Fitness side publishes
    assert!(channel.publish(&workout_envelope("user-7")).await);

    // Diet side consumes its inbound direction
    let handler = RecordingHandler::new();
    let mut dispatcher =
        ConsumerDispatcher::new(ChannelDirection::inbound_for(AgentSource::DietAgent));
    dispatcher.register("workout_completed", handler.clone());

    let processed = dispatcher.drain(&channel).await.unwrap();
    assert_eq!(processed, 1);
    assert_eq!(handler.seen.lock().await.len(), 1);
}

#[tokio::test]
async fn message_survives_store_restart_and_handler_stays_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channel.db");
    let envelope = workout_envelope("user-7");

    // First process: publish, lease, crash before acking
    {
        let channel = MessageChannel::connect(&path).await;
        assert!(channel.publish(&envelope).await);
        let leased = channel
            .lease_next(ChannelDirection::FitnessToDiet, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(leased.is_some(), "message was leased before the crash");
        // Channel dropped with the message still leased
    }

    // Second process: the persisted message is redelivered after the lease
    // expires, and an idempotent handler applies it exactly once
    let channel = MessageChannel::connect(&path).await;
    let handler = RecordingHandler::new();
    let mut dispatcher =
        ConsumerDispatcher::new(ChannelDirection::inbound_for(AgentSource::DietAgent))
            .with_lease(Duration::from_secs(0));
    dispatcher.register("workout_completed", handler.clone());

    dispatcher.drain(&channel).await.unwrap();
    assert_eq!(handler.seen.lock().await.len(), 1);

    // The publisher re-sends the identical envelope; no duplicate effect
    assert!(channel.publish(&envelope).await);
    dispatcher.drain(&channel).await.unwrap();
    assert_eq!(handler.seen.lock().await.len(), 1);
}

#[tokio::test]
async fn directions_do_not_cross() {
    let dir = tempfile::tempdir().unwrap();
    let channel = MessageChannel::connect(dir.path().join("channel.db")).await;

    let diet_envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
        .build(
            "meal_logged",
            "user-7",
            SummaryCard::Diet(DietSummary {
                calories: 420.0,
                ..Default::default()
            }),
        )
        .unwrap();
    assert!(channel.publish(&diet_envelope).await);
    assert!(channel.publish(&workout_envelope("user-7")).await);

    // The diet agent's inbound queue holds only the fitness event
    let handler = RecordingHandler::new();
    let mut dispatcher =
        ConsumerDispatcher::new(ChannelDirection::inbound_for(AgentSource::DietAgent));
    dispatcher.register("workout_completed", handler.clone());
    dispatcher.register("meal_logged", handler.clone());

    let processed = dispatcher.drain(&channel).await.unwrap();
    assert_eq!(processed, 1);

    let seen = handler.seen.lock().await;
    assert!(seen.iter().all(|key| key.contains("workout_completed")));
}
