//! Event vocabularies for the vita agent mesh
//!
//! Each agent publishes from a fixed event vocabulary. The vocabulary is the
//! contract: the envelope builder rejects names outside it, and the consumer
//! dispatcher routes by it.

mod activity;

pub use activity::{ActivityBus, AgentActivity};

use serde::{Deserialize, Serialize};

/// Originating agent for a cross-agent event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSource {
    /// Diet agent (meal analysis, nutrition tracking)
    DietAgent,
    /// Fitness agent (workouts, energy expenditure)
    FitnessAgent,
}

impl AgentSource {
    /// Wire string for this source ("diet_agent" / "fitness_agent")
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentSource::DietAgent => "diet_agent",
            AgentSource::FitnessAgent => "fitness_agent",
        }
    }

    /// Event vocabulary this agent may publish
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            AgentSource::DietAgent => DIET_VOCABULARY,
            AgentSource::FitnessAgent => FITNESS_VOCABULARY,
        }
    }

    /// Whether `event_name` belongs to this agent's vocabulary
    pub fn allows_event(&self, event_name: &str) -> bool {
        self.vocabulary().contains(&event_name)
    }
}

impl std::fmt::Display for AgentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority carried in envelope metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Routine event
    #[default]
    Normal,
    /// Event the receiving agent should apply promptly (e.g. goal changes)
    High,
}

/// Events published by the diet agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DietEvent {
    FoodAnalyzed,
    MealLogged,
    NutritionUpdated,
    DailyNutritionSummary,
    NutritionGoalUpdated,
    BmiCalculated,
}

/// Events published by the fitness agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessEvent {
    WorkoutCompleted,
    ExerciseLogged,
    CaloriesBurned,
    DailyFitnessSummary,
    FitnessGoalUpdated,
    BmiUpdated,
    StepsLogged,
}

/// Diet agent vocabulary, wire order
pub const DIET_VOCABULARY: &[&str] = &[
    "food_analyzed",
    "meal_logged",
    "nutrition_updated",
    "daily_nutrition_summary",
    "nutrition_goal_updated",
    "bmi_calculated",
];

/// Fitness agent vocabulary, wire order
pub const FITNESS_VOCABULARY: &[&str] = &[
    "workout_completed",
    "exercise_logged",
    "calories_burned",
    "daily_fitness_summary",
    "fitness_goal_updated",
    "bmi_updated",
    "steps_logged",
];

impl DietEvent {
    /// Wire name for this event
    pub fn as_str(&self) -> &'static str {
        match self {
            DietEvent::FoodAnalyzed => "food_analyzed",
            DietEvent::MealLogged => "meal_logged",
            DietEvent::NutritionUpdated => "nutrition_updated",
            DietEvent::DailyNutritionSummary => "daily_nutrition_summary",
            DietEvent::NutritionGoalUpdated => "nutrition_goal_updated",
            DietEvent::BmiCalculated => "bmi_calculated",
        }
    }

    /// Parse a wire name back into the enum
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "food_analyzed" => Some(DietEvent::FoodAnalyzed),
            "meal_logged" => Some(DietEvent::MealLogged),
            "nutrition_updated" => Some(DietEvent::NutritionUpdated),
            "daily_nutrition_summary" => Some(DietEvent::DailyNutritionSummary),
            "nutrition_goal_updated" => Some(DietEvent::NutritionGoalUpdated),
            "bmi_calculated" => Some(DietEvent::BmiCalculated),
            _ => None,
        }
    }
}

impl FitnessEvent {
    /// Wire name for this event
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessEvent::WorkoutCompleted => "workout_completed",
            FitnessEvent::ExerciseLogged => "exercise_logged",
            FitnessEvent::CaloriesBurned => "calories_burned",
            FitnessEvent::DailyFitnessSummary => "daily_fitness_summary",
            FitnessEvent::FitnessGoalUpdated => "fitness_goal_updated",
            FitnessEvent::BmiUpdated => "bmi_updated",
            FitnessEvent::StepsLogged => "steps_logged",
        }
    }

    /// Parse a wire name back into the enum
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "workout_completed" => Some(FitnessEvent::WorkoutCompleted),
            "exercise_logged" => Some(FitnessEvent::ExerciseLogged),
            "calories_burned" => Some(FitnessEvent::CaloriesBurned),
            "daily_fitness_summary" => Some(FitnessEvent::DailyFitnessSummary),
            "fitness_goal_updated" => Some(FitnessEvent::FitnessGoalUpdated),
            "bmi_updated" => Some(FitnessEvent::BmiUpdated),
            "steps_logged" => Some(FitnessEvent::StepsLogged),
            _ => None,
        }
    }
}

impl std::fmt::Display for DietEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for FitnessEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
