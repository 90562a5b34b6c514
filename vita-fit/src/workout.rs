//! Workout energy model
//!
//! MET-based estimation: kcal = MET × body weight (kg) × hours. The MET
//! table is static configuration with compiled defaults; unknown workout
//! types are rejected rather than estimated with an invented value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body weight assumed when the request does not provide one
pub const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;

/// Rough energy cost of one step
pub const CALORIES_PER_STEP: f64 = 0.04;

/// MET values per workout type, keyed by lowercase name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetTable {
    #[serde(flatten)]
    values: HashMap<String, f64>,
}

impl Default for MetTable {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert("running".to_string(), 9.8);
        values.insert("jogging".to_string(), 7.0);
        values.insert("cycling".to_string(), 7.5);
        values.insert("swimming".to_string(), 8.0);
        values.insert("walking".to_string(), 3.5);
        values.insert("hiking".to_string(), 6.0);
        values.insert("rowing".to_string(), 7.0);
        values.insert("yoga".to_string(), 2.5);
        values.insert("strength training".to_string(), 6.0);
        values.insert("hiit".to_string(), 10.0);
        Self { values }
    }
}

impl MetTable {
    /// MET value for a workout type, `None` for an unknown type
    pub fn met_for(&self, workout_type: &str) -> Option<f64> {
        self.values
            .get(workout_type.trim().to_lowercase().as_str())
            .copied()
    }

    /// Known workout type names, sorted, for error messages
    pub fn known_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Energy for a workout: MET × weight × hours
pub fn calories_burned(met: f64, weight_kg: f64, duration_minutes: f64) -> f64 {
    met * weight_kg * (duration_minutes / 60.0)
}

/// Energy for a step count
pub fn calories_from_steps(steps: u64) -> f64 {
    steps as f64 * CALORIES_PER_STEP
}
