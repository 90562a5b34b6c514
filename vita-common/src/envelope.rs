//! Cross-agent event envelope
//!
//! The envelope is the message contract between the diet and fitness agents.
//! Construction goes through [`EnvelopeBuilder`], which validates the event
//! name against the publishing agent's vocabulary and the summary card shape
//! against the source. Envelopes are immutable after construction.
//!
//! # Wire format
//! JSON body, `content_type: application/json`:
//! ```text
//! {
//!   "event_name": "meal_logged",
//!   "user_id": "...",
//!   "timestamp": "2026-08-06T12:00:00Z",
//!   "source": "diet_agent",
//!   "summary_card": { ... },
//!   "metadata": {"version": "1.0", "agent_type": "diet_agent", "priority": "normal"}
//! }
//! ```
//!
//! The summary card schema is determined by `source`; optional sub-fields are
//! always present (serialized as `null` when absent) so consumers never need
//! defensive key-existence checks.

use crate::error::{Error, Result};
use crate::events::{AgentSource, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope schema version, bumped only on incompatible changes
pub const SCHEMA_VERSION: &str = "1.0";

/// Diet agent summary card
///
/// Every field is explicitly serialized; absent optionals are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietSummary {
    /// Total calories for the event (meal or daily total)
    #[serde(default)]
    pub calories: f64,
    /// Protein grams
    #[serde(default)]
    pub protein_g: f64,
    /// Carbohydrate grams
    #[serde(default)]
    pub carbs_g: f64,
    /// Fat grams
    #[serde(default)]
    pub fat_g: f64,
    /// Number of meals contributing to the totals
    #[serde(default)]
    pub meal_count: u32,
    /// Active calorie goal, if one is set
    #[serde(default)]
    pub goal_calories: Option<f64>,
    /// Body mass index, if known
    #[serde(default)]
    pub bmi: Option<f64>,
    /// Detector sources that contributed (for analysis events)
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Fitness agent summary card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessSummary {
    /// Calories burned for the event
    #[serde(default)]
    pub calories_burned: f64,
    /// Workout type, if the event concerns a workout
    #[serde(default)]
    pub workout_type: Option<String>,
    /// Workout duration in minutes
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    /// Step count, if the event concerns steps
    #[serde(default)]
    pub steps: Option<u64>,
    /// Active calorie-burn goal, if one is set
    #[serde(default)]
    pub goal_calories_burned: Option<f64>,
    /// Body mass index, if known
    #[serde(default)]
    pub bmi: Option<f64>,
}

/// Event-specific payload, shape determined by the source agent
///
/// Deserialization happens through the envelope, which selects the variant
/// from the `source` field; the card alone is deliberately not
/// deserializable (an untagged guess could pick the wrong shape).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryCard {
    /// Diet event payload
    Diet(DietSummary),
    /// Fitness event payload
    Fitness(FitnessSummary),
}

impl SummaryCard {
    /// Whether this card shape belongs to the given source agent
    pub fn matches_source(&self, source: AgentSource) -> bool {
        matches!(
            (self, source),
            (SummaryCard::Diet(_), AgentSource::DietAgent)
                | (SummaryCard::Fitness(_), AgentSource::FitnessAgent)
        )
    }
}

/// Envelope metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Envelope schema version
    pub version: String,
    /// Publishing agent type ("diet_agent" / "fitness_agent")
    pub agent_type: String,
    /// Delivery priority
    pub priority: Priority,
}

/// The standardized cross-agent message
///
/// Published once, never mutated, delivered at-least-once. Handlers must be
/// idempotent, keyed by [`EventEnvelope::dedup_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct EventEnvelope {
    /// Event name from the source agent's fixed vocabulary
    pub event_name: String,
    /// User the event concerns
    pub user_id: String,
    /// Creation time, UTC
    pub timestamp: DateTime<Utc>,
    /// Publishing agent
    pub source: AgentSource,
    /// Event-specific payload
    pub summary_card: SummaryCard,
    /// Schema version, agent type, priority
    pub metadata: EnvelopeMetadata,
}

impl EventEnvelope {
    /// Idempotency key for consumer-side upserts
    ///
    /// At-least-once delivery means a handler can see the same envelope
    /// twice; handlers key their effects on this rather than blindly
    /// inserting.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.user_id,
            self.event_name,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Wire-shape helper: deserializes the raw JSON, then `TryFrom` resolves the
/// summary card by source and enforces envelope invariants.
#[derive(Deserialize)]
struct RawEnvelope {
    event_name: String,
    user_id: String,
    timestamp: DateTime<Utc>,
    source: AgentSource,
    summary_card: serde_json::Value,
    metadata: EnvelopeMetadata,
}

impl TryFrom<RawEnvelope> for EventEnvelope {
    type Error = Error;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        if !raw.source.allows_event(&raw.event_name) {
            return Err(Error::Validation(format!(
                "event '{}' is not in the {} vocabulary",
                raw.event_name, raw.source
            )));
        }

        let summary_card = match raw.source {
            AgentSource::DietAgent => SummaryCard::Diet(
                serde_json::from_value::<DietSummary>(raw.summary_card)
                    .map_err(|e| Error::Validation(format!("bad diet summary card: {e}")))?,
            ),
            AgentSource::FitnessAgent => SummaryCard::Fitness(
                serde_json::from_value::<FitnessSummary>(raw.summary_card)
                    .map_err(|e| Error::Validation(format!("bad fitness summary card: {e}")))?,
            ),
        };

        Ok(EventEnvelope {
            event_name: raw.event_name,
            user_id: raw.user_id,
            timestamp: raw.timestamp,
            source: raw.source,
            summary_card,
            metadata: raw.metadata,
        })
    }
}

/// Builds validated envelopes for one agent
///
/// # Example
/// ```rust,ignore
/// let builder = EnvelopeBuilder::new(AgentSource::DietAgent);
/// let envelope = builder.build(
///     "meal_logged",
///     "user-42",
///     SummaryCard::Diet(DietSummary { calories: 540.0, ..Default::default() }),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    source: AgentSource,
    priority: Priority,
}

impl EnvelopeBuilder {
    /// Create a builder publishing as the given agent
    pub fn new(source: AgentSource) -> Self {
        Self {
            source,
            priority: Priority::Normal,
        }
    }

    /// Override the priority for envelopes built by this builder
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Construct a validated envelope
    ///
    /// Fills `timestamp` with the current UTC time and `metadata` with the
    /// schema version, agent type, and priority.
    ///
    /// # Errors
    /// `Error::Validation` when `event_name` is outside the agent's
    /// vocabulary, `user_id` is empty, or the summary card shape does not
    /// match the source.
    pub fn build(
        &self,
        event_name: &str,
        user_id: &str,
        summary_card: SummaryCard,
    ) -> Result<EventEnvelope> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("user_id must not be empty".to_string()));
        }
        if !self.source.allows_event(event_name) {
            return Err(Error::Validation(format!(
                "event '{}' is not in the {} vocabulary",
                event_name, self.source
            )));
        }
        if !summary_card.matches_source(self.source) {
            return Err(Error::Validation(format!(
                "summary card shape does not match source {}",
                self.source
            )));
        }

        Ok(EventEnvelope {
            event_name: event_name.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            source: self.source,
            summary_card,
            metadata: EnvelopeMetadata {
                version: SCHEMA_VERSION.to_string(),
                agent_type: self.source.as_str().to_string(),
                priority: self.priority,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diet_card() -> SummaryCard {
        SummaryCard::Diet(DietSummary {
            calories: 540.0,
            protein_g: 32.0,
            carbs_g: 61.0,
            fat_g: 18.0,
            meal_count: 1,
            goal_calories: Some(2000.0),
            bmi: None,
            sources: vec!["vision".to_string(), "text".to_string()],
        })
    }

    fn fitness_card() -> SummaryCard {
        SummaryCard::Fitness(FitnessSummary {
            calories_burned: 310.0,
            workout_type: Some("running".to_string()),
            duration_minutes: Some(30.0),
            steps: None,
            goal_calories_burned: None,
            bmi: Some(23.4),
        })
    }

    #[test]
    fn test_round_trip_diet_envelope() {
        let envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build("meal_logged", "user-42", diet_card())
            .unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_round_trip_fitness_envelope() {
        let envelope = EnvelopeBuilder::new(AgentSource::FitnessAgent)
            .with_priority(Priority::High)
            .build("workout_completed", "user-42", fitness_card())
            .unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.metadata.priority, Priority::High);
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build("food_analyzed", "user-1", diet_card())
            .unwrap();

        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        // bmi is absent from the card, but the key is present as null
        assert_eq!(value["summary_card"]["bmi"], serde_json::Value::Null);
    }

    #[test]
    fn test_builder_rejects_foreign_vocabulary() {
        let err = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build("workout_completed", "user-1", diet_card())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_builder_rejects_mismatched_card() {
        let err = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build("meal_logged", "user-1", fitness_card())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_builder_rejects_empty_user() {
        let err = EnvelopeBuilder::new(AgentSource::FitnessAgent)
            .build("steps_logged", "  ", fitness_card())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_parse_rejects_missing_required_field() {
        // No user_id
        let json = r#"{
            "event_name": "meal_logged",
            "timestamp": "2026-08-06T12:00:00Z",
            "source": "diet_agent",
            "summary_card": {},
            "metadata": {"version": "1.0", "agent_type": "diet_agent", "priority": "normal"}
        }"#;
        assert!(serde_json::from_str::<EventEnvelope>(json).is_err());
    }

    #[test]
    fn test_parse_rejects_foreign_event_name() {
        let json = r#"{
            "event_name": "workout_completed",
            "user_id": "user-1",
            "timestamp": "2026-08-06T12:00:00Z",
            "source": "diet_agent",
            "summary_card": {},
            "metadata": {"version": "1.0", "agent_type": "diet_agent", "priority": "normal"}
        }"#;
        assert!(serde_json::from_str::<EventEnvelope>(json).is_err());
    }

    #[test]
    fn test_parse_fills_card_defaults() {
        // Sparse summary card still parses, with explicit defaults
        let json = r#"{
            "event_name": "bmi_calculated",
            "user_id": "user-1",
            "timestamp": "2026-08-06T12:00:00Z",
            "source": "diet_agent",
            "summary_card": {"bmi": 21.9},
            "metadata": {"version": "1.0", "agent_type": "diet_agent", "priority": "normal"}
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        match envelope.summary_card {
            SummaryCard::Diet(card) => {
                assert_eq!(card.bmi, Some(21.9));
                assert_eq!(card.calories, 0.0);
                assert!(card.sources.is_empty());
            }
            _ => panic!("wrong card shape"),
        }
    }

    #[test]
    fn test_dedup_key_is_stable() {
        let envelope = EnvelopeBuilder::new(AgentSource::DietAgent)
            .build("meal_logged", "user-42", diet_card())
            .unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dedup_key(), envelope.dedup_key());
    }
}
