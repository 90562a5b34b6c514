//! Per-user daily activity ledger
//!
//! Day-scoped in-memory state for the fitness agent: workouts, burned
//! energy, steps, plus the intake view fed by diet-agent events. Inbound
//! cross-agent effects are keyed by envelope dedup key so redelivery is a
//! no-op.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Point-in-time view of one user's activity day
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySnapshot {
    pub date: NaiveDate,
    pub workouts: u32,
    pub calories_burned: f64,
    pub steps: u64,
    /// Intake calories reported by the diet agent
    pub intake_calories: f64,
    /// Meals reported by the diet agent
    pub meal_count: u32,
    pub goal_calories_burned: Option<f64>,
    /// Daily intake goal reported by the diet agent
    pub intake_goal_calories: Option<f64>,
    pub bmi: Option<f64>,
}

struct UserDay {
    date: NaiveDate,
    workouts: u32,
    calories_burned: f64,
    steps: u64,
    intake_calories: f64,
    meal_count: u32,
    goal_calories_burned: Option<f64>,
    intake_goal_calories: Option<f64>,
    bmi: Option<f64>,
    applied: HashSet<String>,
}

impl UserDay {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            workouts: 0,
            calories_burned: 0.0,
            steps: 0,
            intake_calories: 0.0,
            meal_count: 0,
            goal_calories_burned: None,
            intake_goal_calories: None,
            bmi: None,
            applied: HashSet::new(),
        }
    }

    fn roll_over(&mut self, date: NaiveDate) {
        if self.date != date {
            self.date = date;
            self.workouts = 0;
            self.calories_burned = 0.0;
            self.steps = 0;
            self.intake_calories = 0.0;
            self.meal_count = 0;
            self.applied.clear();
        }
    }

    fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            date: self.date,
            workouts: self.workouts,
            calories_burned: self.calories_burned,
            steps: self.steps,
            intake_calories: self.intake_calories,
            meal_count: self.meal_count,
            goal_calories_burned: self.goal_calories_burned,
            intake_goal_calories: self.intake_goal_calories,
            bmi: self.bmi,
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Per-user daily activity state
#[derive(Default)]
pub struct ActivityLedger {
    days: RwLock<HashMap<String, UserDay>>,
}

impl ActivityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_day<T>(&self, user_id: &str, apply: impl FnOnce(&mut UserDay) -> T) -> T {
        let mut days = self.days.write().await;
        let day = days
            .entry(user_id.to_string())
            .or_insert_with(|| UserDay::fresh(today()));
        day.roll_over(today());
        apply(day)
    }

    /// Record a completed workout
    pub async fn record_workout(&self, user_id: &str, calories: f64) -> ActivitySnapshot {
        self.with_day(user_id, |day| {
            day.workouts += 1;
            day.calories_burned += calories;
            day.snapshot()
        })
        .await
    }

    /// Record a step count report
    pub async fn record_steps(&self, user_id: &str, steps: u64, calories: f64) -> ActivitySnapshot {
        self.with_day(user_id, |day| {
            day.steps += steps;
            day.calories_burned += calories;
            day.snapshot()
        })
        .await
    }

    /// Add meal intake reported by the diet agent, once per envelope
    pub async fn apply_meal(&self, user_id: &str, dedup_key: &str, calories: f64) -> bool {
        self.with_day(user_id, |day| {
            if !day.applied.insert(dedup_key.to_string()) {
                debug!(user_id, dedup_key, "Duplicate delivery, meal intake skipped");
                return false;
            }
            day.intake_calories += calories;
            day.meal_count += 1;
            true
        })
        .await
    }

    /// Replace the intake day totals (daily summary events are absolute)
    pub async fn set_intake_totals(&self, user_id: &str, calories: f64, meal_count: u32) {
        self.with_day(user_id, |day| {
            day.intake_calories = calories;
            day.meal_count = meal_count;
        })
        .await;
    }

    /// Mark an envelope applied; false when it was already seen
    pub async fn apply_once(&self, user_id: &str, dedup_key: &str) -> bool {
        self.with_day(user_id, |day| day.applied.insert(dedup_key.to_string()))
            .await
    }

    /// Store the user's BMI
    pub async fn set_bmi(&self, user_id: &str, bmi: f64) {
        self.with_day(user_id, |day| day.bmi = Some(bmi)).await;
    }

    /// Set the daily calorie-burn goal
    pub async fn set_goal(&self, user_id: &str, calories_burned: f64) {
        self.with_day(user_id, |day| day.goal_calories_burned = Some(calories_burned))
            .await;
    }

    /// Store the diet agent's intake goal
    pub async fn set_intake_goal(&self, user_id: &str, calories: f64) {
        self.with_day(user_id, |day| day.intake_goal_calories = Some(calories))
            .await;
    }

    /// Current snapshot for a user (zeros for a user never seen)
    pub async fn snapshot(&self, user_id: &str) -> ActivitySnapshot {
        self.with_day(user_id, |day| day.snapshot()).await
    }
}
