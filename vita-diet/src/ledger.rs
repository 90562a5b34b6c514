//! Per-user daily nutrition ledger
//!
//! In-memory day-scoped state: meal intake totals, calories credited back
//! by the fitness agent, the active goal, and BMI. Idempotency for inbound
//! cross-agent events is enforced here via applied dedup keys, so the same
//! envelope delivered twice credits energy exactly once.

use crate::nutrition::NutritionRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Point-in-time view of one user's day
#[derive(Debug, Clone, Serialize)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub intake: NutritionRecord,
    pub meal_count: u32,
    pub calories_burned: f64,
    pub goal_calories: Option<f64>,
    pub bmi: Option<f64>,
}

struct UserDay {
    date: NaiveDate,
    intake: NutritionRecord,
    meal_count: u32,
    calories_burned: f64,
    goal_calories: Option<f64>,
    bmi: Option<f64>,
    /// Dedup keys of cross-agent events already applied today
    applied: HashSet<String>,
}

impl UserDay {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            intake: NutritionRecord::default(),
            meal_count: 0,
            calories_burned: 0.0,
            goal_calories: None,
            bmi: None,
            applied: HashSet::new(),
        }
    }

    /// Goal and BMI outlive the day; the rest resets at midnight
    fn roll_over(&mut self, date: NaiveDate) {
        if self.date != date {
            self.date = date;
            self.intake = NutritionRecord::default();
            self.meal_count = 0;
            self.calories_burned = 0.0;
            self.applied.clear();
        }
    }

    fn snapshot(&self) -> DaySnapshot {
        DaySnapshot {
            date: self.date,
            intake: self.intake,
            meal_count: self.meal_count,
            calories_burned: self.calories_burned,
            goal_calories: self.goal_calories,
            bmi: self.bmi,
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Per-user daily state, shared across handlers
#[derive(Default)]
pub struct DailyLedger {
    days: RwLock<HashMap<String, UserDay>>,
}

impl DailyLedger {
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

    /// Add a meal's totals to the user's day
    pub async fn record_meal(&self, user_id: &str, totals: &NutritionRecord) -> DaySnapshot {
        self.with_day(user_id, |day| {
            day.intake.accumulate(totals);
            day.meal_count += 1;
            day.snapshot()
        })
        .await
    }

    /// Credit burned energy reported by the fitness agent
    ///
    /// Keyed by the envelope dedup key: a redelivered envelope is a no-op.
    /// Returns whether the credit was applied.
    pub async fn credit_burned(&self, user_id: &str, dedup_key: &str, calories: f64) -> bool {
        self.with_day(user_id, |day| {
            if !day.applied.insert(dedup_key.to_string()) {
                debug!(user_id, dedup_key, "Duplicate delivery, credit skipped");
                return false;
            }
            day.calories_burned += calories;
            true
        })
        .await
    }

    /// Store the user's BMI
    pub async fn set_bmi(&self, user_id: &str, bmi: f64) {
        self.with_day(user_id, |day| day.bmi = Some(bmi)).await;
    }

    /// Set the daily calorie goal
    pub async fn set_goal(&self, user_id: &str, calories: f64) {
        self.with_day(user_id, |day| day.goal_calories = Some(calories))
            .await;
    }

    /// Current snapshot for a user (zeros for a user never seen)
    pub async fn snapshot(&self, user_id: &str) -> DaySnapshot {
        self.with_day(user_id, |day| day.snapshot()).await
    }
}
