//! Inbound diet-event handlers
//!
//! The fitness agent consumes diet events to keep its intake view current
//! and to mirror BMI. All handlers are idempotent under at-least-once
//! delivery, keyed by the envelope dedup key.

use crate::ledger::ActivityLedger;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use vita_common::channel::{ChannelDirection, MessageChannel};
use vita_common::dispatcher::{ConsumerDispatcher, EventHandler};
use vita_common::envelope::{
    EnvelopeBuilder, EventEnvelope, FitnessSummary, SummaryCard,
};
use vita_common::events::{ActivityBus, AgentSource, DietEvent, FitnessEvent};
use vita_common::{Error, Result};

fn diet_card(envelope: &EventEnvelope) -> Result<&vita_common::envelope::DietSummary> {
    match &envelope.summary_card {
        SummaryCard::Diet(card) => Ok(card),
        SummaryCard::Fitness(_) => Err(Error::Validation(
            "diet event carried a non-diet summary card".to_string(),
        )),
    }
}

/// Adds meal intake from `meal_logged`
pub struct MealLoggedHandler {
    ledger: Arc<ActivityLedger>,
}

impl MealLoggedHandler {
    pub fn new(ledger: Arc<ActivityLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EventHandler for MealLoggedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let card = diet_card(envelope)?;
        let applied = self
            .ledger
            .apply_meal(&envelope.user_id, &envelope.dedup_key(), card.calories)
            .await;
        debug!(
            user_id = %envelope.user_id,
            calories = card.calories,
            applied,
            "Meal intake processed"
        );
        Ok(())
    }
}

/// Replaces the intake day view from `daily_nutrition_summary` /
/// `nutrition_updated` (absolute totals, naturally idempotent)
pub struct IntakeTotalsHandler {
    ledger: Arc<ActivityLedger>,
}

impl IntakeTotalsHandler {
    pub fn new(ledger: Arc<ActivityLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EventHandler for IntakeTotalsHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let card = diet_card(envelope)?;
        self.ledger
            .set_intake_totals(&envelope.user_id, card.calories, card.meal_count)
            .await;
        Ok(())
    }
}

/// Stores the diet agent's intake goal from `nutrition_goal_updated`
pub struct IntakeGoalHandler {
    ledger: Arc<ActivityLedger>,
}

impl IntakeGoalHandler {
    pub fn new(ledger: Arc<ActivityLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EventHandler for IntakeGoalHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let card = diet_card(envelope)?;
        match card.goal_calories {
            Some(goal) => {
                self.ledger.set_intake_goal(&envelope.user_id, goal).await;
            }
            None => {
                warn!(user_id = %envelope.user_id, "goal update without a goal value, ignored");
            }
        }
        Ok(())
    }
}

/// Mirrors `bmi_calculated`: stores the BMI and republishes `bmi_updated`
/// so both agents agree on the value
pub struct BmiCalculatedHandler {
    ledger: Arc<ActivityLedger>,
    channel: MessageChannel,
}

impl BmiCalculatedHandler {
    pub fn new(ledger: Arc<ActivityLedger>, channel: MessageChannel) -> Self {
        Self { ledger, channel }
    }
}

#[async_trait]
impl EventHandler for BmiCalculatedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let card = diet_card(envelope)?;
        let Some(bmi) = card.bmi else {
            warn!(user_id = %envelope.user_id, "bmi_calculated without a BMI value, ignored");
            return Ok(());
        };

        // Mirror only on first application so redelivery does not fan out
        // duplicate bmi_updated envelopes
        if !self
            .ledger
            .apply_once(&envelope.user_id, &envelope.dedup_key())
            .await
        {
            return Ok(());
        }
        self.ledger.set_bmi(&envelope.user_id, bmi).await;

        let mirror = EnvelopeBuilder::new(AgentSource::FitnessAgent).build(
            FitnessEvent::BmiUpdated.as_str(),
            &envelope.user_id,
            SummaryCard::Fitness(FitnessSummary {
                bmi: Some(bmi),
                ..Default::default()
            }),
        )?;
        if !self.channel.publish(&mirror).await {
            warn!(user_id = %envelope.user_id, "bmi_updated mirror not published (degraded)");
        }
        Ok(())
    }
}

/// Dispatcher for the fitness agent's inbound queue (diet → fitness)
pub fn build_dispatcher(
    ledger: Arc<ActivityLedger>,
    channel: MessageChannel,
    activity: ActivityBus,
) -> ConsumerDispatcher {
    let mut dispatcher =
        ConsumerDispatcher::new(ChannelDirection::inbound_for(AgentSource::FitnessAgent))
            .with_activity_bus(activity);

    dispatcher.register(
        DietEvent::MealLogged.as_str(),
        Arc::new(MealLoggedHandler::new(ledger.clone())),
    );
    let totals = Arc::new(IntakeTotalsHandler::new(ledger.clone()));
    dispatcher.register(DietEvent::NutritionUpdated.as_str(), totals.clone());
    dispatcher.register(DietEvent::DailyNutritionSummary.as_str(), totals);
    dispatcher.register(
        DietEvent::NutritionGoalUpdated.as_str(),
        Arc::new(IntakeGoalHandler::new(ledger.clone())),
    );
    dispatcher.register(
        DietEvent::BmiCalculated.as_str(),
        Arc::new(BmiCalculatedHandler::new(ledger, channel)),
    );

    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_common::envelope::DietSummary;

    fn meal_envelope(calories: f64) -> EventEnvelope {
        EnvelopeBuilder::new(AgentSource::DietAgent)
            .build(
                "meal_logged",
                "user-1",
                SummaryCard::Diet(DietSummary {
                    calories,
                    meal_count: 1,
                    ..Default::default()
                }),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_meal_logged_applies_once() {
        let ledger = Arc::new(ActivityLedger::new());
        let handler = MealLoggedHandler::new(ledger.clone());
        let envelope = meal_envelope(540.0);

        handler.handle(&envelope).await.unwrap();
        handler.handle(&envelope).await.unwrap();

        let snapshot = ledger.snapshot("user-1").await;
        assert_eq!(snapshot.intake_calories, 540.0);
        assert_eq!(snapshot.meal_count, 1);
    }

    #[tokio::test]
    async fn test_daily_summary_overwrites() {
        let ledger = Arc::new(ActivityLedger::new());
        let handler = IntakeTotalsHandler::new(ledger.clone());

        let envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build(
                "daily_nutrition_summary",
                "user-1",
                SummaryCard::Diet(DietSummary {
                    calories: 1650.0,
                    meal_count: 3,
                    ..Default::default()
                }),
            )
            .unwrap();

        handler.handle(&envelope).await.unwrap();
        handler.handle(&envelope).await.unwrap();

        let snapshot = ledger.snapshot("user-1").await;
        assert_eq!(snapshot.intake_calories, 1650.0);
        assert_eq!(snapshot.meal_count, 3);
    }

    #[tokio::test]
    async fn test_bmi_calculated_mirrors_bmi_updated_once() {
        let dir = tempfile::tempdir().unwrap();
        let channel = MessageChannel::connect(dir.path().join("channel.db")).await;
        let ledger = Arc::new(ActivityLedger::new());
        let handler = BmiCalculatedHandler::new(ledger.clone(), channel.clone());

        let envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build(
                "bmi_calculated",
                "user-1",
                SummaryCard::Diet(DietSummary {
                    bmi: Some(23.4),
                    ..Default::default()
                }),
            )
            .unwrap();

        // Redelivered twice; only one mirror envelope goes out
        handler.handle(&envelope).await.unwrap();
        handler.handle(&envelope).await.unwrap();

        assert_eq!(ledger.snapshot("user-1").await.bmi, Some(23.4));
        assert_eq!(
            channel
                .pending_count(ChannelDirection::FitnessToDiet)
                .await
                .unwrap(),
            1
        );
    }
}
