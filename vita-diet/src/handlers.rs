//! Inbound fitness-event handlers
//!
//! The diet agent consumes the fitness agent's events to keep its daily
//! energy view current. Delivery is at-least-once, so every handler is
//! idempotent: effects are keyed by the envelope dedup key through the
//! ledger.

use crate::ledger::DailyLedger;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use vita_common::channel::ChannelDirection;
use vita_common::dispatcher::{ConsumerDispatcher, EventHandler};
use vita_common::envelope::{EventEnvelope, SummaryCard};
use vita_common::events::{ActivityBus, AgentSource, FitnessEvent};
use vita_common::{Error, Result};

/// Credits burned energy from energy-bearing fitness events
///
/// Registered for `calories_burned`, `exercise_logged`, and `steps_logged`.
/// `workout_completed` is NOT credited here: the fitness agent pairs it
/// with a `calories_burned` envelope for the same workout, and crediting
/// both would double-count.
pub struct CaloriesBurnedHandler {
    ledger: Arc<DailyLedger>,
}

impl CaloriesBurnedHandler {
    pub fn new(ledger: Arc<DailyLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EventHandler for CaloriesBurnedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let SummaryCard::Fitness(card) = &envelope.summary_card else {
            return Err(Error::Validation(
                "fitness event carried a non-fitness summary card".to_string(),
            ));
        };

        let applied = self
            .ledger
            .credit_burned(&envelope.user_id, &envelope.dedup_key(), card.calories_burned)
            .await;
        debug!(
            user_id = %envelope.user_id,
            event = %envelope.event_name,
            calories_burned = card.calories_burned,
            applied,
            "Burned energy credit processed"
        );
        Ok(())
    }
}

/// Acknowledges `workout_completed` without crediting energy
///
/// The energy for the workout arrives in its paired `calories_burned`
/// envelope.
pub struct WorkoutNotedHandler;

#[async_trait]
impl EventHandler for WorkoutNotedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let SummaryCard::Fitness(card) = &envelope.summary_card else {
            return Err(Error::Validation(
                "fitness event carried a non-fitness summary card".to_string(),
            ));
        };
        debug!(
            user_id = %envelope.user_id,
            workout_type = ?card.workout_type,
            duration_minutes = ?card.duration_minutes,
            "Workout completion noted"
        );
        Ok(())
    }
}

/// Stores the peer-computed BMI from `bmi_updated`
pub struct BmiUpdatedHandler {
    ledger: Arc<DailyLedger>,
}

impl BmiUpdatedHandler {
    pub fn new(ledger: Arc<DailyLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EventHandler for BmiUpdatedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let SummaryCard::Fitness(card) = &envelope.summary_card else {
            return Err(Error::Validation(
                "fitness event carried a non-fitness summary card".to_string(),
            ));
        };

        match card.bmi {
            Some(bmi) => {
                self.ledger.set_bmi(&envelope.user_id, bmi).await;
                debug!(user_id = %envelope.user_id, bmi, "BMI stored from fitness agent");
            }
            None => {
                warn!(user_id = %envelope.user_id, "bmi_updated event without a BMI value, ignored");
            }
        }
        Ok(())
    }
}

/// Dispatcher for the diet agent's inbound queue (fitness → diet)
pub fn build_dispatcher(ledger: Arc<DailyLedger>, activity: ActivityBus) -> ConsumerDispatcher {
    let mut dispatcher =
        ConsumerDispatcher::new(ChannelDirection::inbound_for(AgentSource::DietAgent))
            .with_activity_bus(activity);

    let burned = Arc::new(CaloriesBurnedHandler::new(ledger.clone()));
    dispatcher.register(FitnessEvent::CaloriesBurned.as_str(), burned.clone());
    dispatcher.register(FitnessEvent::ExerciseLogged.as_str(), burned.clone());
    dispatcher.register(FitnessEvent::StepsLogged.as_str(), burned);
    // workout_completed carries the same energy as its paired
    // calories_burned envelope; acknowledge it without a second credit
    dispatcher.register(
        FitnessEvent::WorkoutCompleted.as_str(),
        Arc::new(WorkoutNotedHandler),
    );
    dispatcher.register(
        FitnessEvent::BmiUpdated.as_str(),
        Arc::new(BmiUpdatedHandler::new(ledger)),
    );

    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_common::envelope::{EnvelopeBuilder, FitnessSummary};

    fn workout_envelope(calories: f64) -> EventEnvelope {
        EnvelopeBuilder::new(AgentSource::FitnessAgent)
            .build(
                "calories_burned",
                "user-1",
                SummaryCard::Fitness(FitnessSummary {
                    calories_burned: calories,
                    workout_type: Some("running".to_string()),
                    duration_minutes: Some(30.0),
                    ..Default::default()
                }),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_burned_credit_applies_once_per_envelope() {
        let ledger = Arc::new(DailyLedger::new());
        let handler = CaloriesBurnedHandler::new(ledger.clone());
        let envelope = workout_envelope(310.0);

        // At-least-once delivery: the same envelope arrives twice
        handler.handle(&envelope).await.unwrap();
        handler.handle(&envelope).await.unwrap();

        let snapshot = ledger.snapshot("user-1").await;
        assert_eq!(snapshot.calories_burned, 310.0);
    }

    #[tokio::test]
    async fn test_distinct_envelopes_accumulate() {
        let ledger = Arc::new(DailyLedger::new());
        let handler = CaloriesBurnedHandler::new(ledger.clone());

        let first = workout_envelope(310.0);
        let mut second = workout_envelope(90.0);
        // Distinct dedup key regardless of timer resolution
        second.timestamp = first.timestamp + chrono::Duration::seconds(60);

        handler.handle(&first).await.unwrap();
        handler.handle(&second).await.unwrap();

        let snapshot = ledger.snapshot("user-1").await;
        assert_eq!(snapshot.calories_burned, 400.0);
    }

    #[tokio::test]
    async fn test_bmi_updated_stores_value() {
        let ledger = Arc::new(DailyLedger::new());
        let handler = BmiUpdatedHandler::new(ledger.clone());

        let envelope = EnvelopeBuilder::new(AgentSource::FitnessAgent)
            .build(
                "bmi_updated",
                "user-1",
                SummaryCard::Fitness(FitnessSummary {
                    bmi: Some(24.1),
                    ..Default::default()
                }),
            )
            .unwrap();
        handler.handle(&envelope).await.unwrap();

        assert_eq!(ledger.snapshot("user-1").await.bmi, Some(24.1));
    }

    #[tokio::test]
    async fn test_mismatched_card_is_a_handler_error() {
        use vita_common::envelope::DietSummary;

        let ledger = Arc::new(DailyLedger::new());
        let handler = CaloriesBurnedHandler::new(ledger);

        // Hand-built envelope with the wrong card shape; the builder would
        // reject this, so construct the struct directly
        let envelope = EventEnvelope {
            event_name: "workout_completed".to_string(),
            user_id: "user-1".to_string(),
            timestamp: chrono::Utc::now(),
            source: AgentSource::FitnessAgent,
            summary_card: SummaryCard::Diet(DietSummary::default()),
            metadata: vita_common::envelope::EnvelopeMetadata {
                version: "1.0".to_string(),
                agent_type: "fitness_agent".to_string(),
                priority: Default::default(),
            },
        };

        assert!(handler.handle(&envelope).await.is_err());
    }
}
