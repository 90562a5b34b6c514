//! Workout, steps, goal, and daily summary endpoints

use crate::error::{ApiError, ApiResult};
use crate::ledger::ActivitySnapshot;
use crate::workout::{calories_burned, calories_from_steps};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use vita_common::envelope::FitnessSummary;
use vita_common::events::{FitnessEvent, Priority};

/// POST /workouts request body
#[derive(Debug, Deserialize)]
pub struct WorkoutRequest {
    pub user_id: String,
    pub workout_type: String,
    pub duration_minutes: f64,
    /// Body weight for the MET formula; configured default when omitted
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

/// POST /workouts response
#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub user_id: String,
    pub workout_type: String,
    pub duration_minutes: f64,
    pub calories_burned: f64,
    pub day: ActivitySnapshot,
}

/// POST /workouts - log a workout and publish its energy
pub async fn log_workout(
    State(state): State<AppState>,
    Json(request): Json<WorkoutRequest>,
) -> ApiResult<Json<WorkoutResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if !request.duration_minutes.is_finite()
        || request.duration_minutes <= 0.0
        || request.duration_minutes > 1440.0
    {
        return Err(ApiError::BadRequest(
            "duration_minutes must be between 0 and 1440".to_string(),
        ));
    }
    let weight_kg = request
        .weight_kg
        .unwrap_or(state.config.workouts.default_weight_kg);
    if !(2.0..=500.0).contains(&weight_kg) {
        return Err(ApiError::BadRequest(
            "weight_kg must be between 2 and 500".to_string(),
        ));
    }

    // Unknown workout types are rejected, not estimated with a made-up MET
    let met = state
        .config
        .workouts
        .met
        .met_for(&request.workout_type)
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown workout_type '{}'; known types: {}",
                request.workout_type,
                state.config.workouts.met.known_types().join(", ")
            ))
        })?;

    let calories = calories_burned(met, weight_kg, request.duration_minutes);
    let day = state.ledger.record_workout(&user_id, calories).await;

    let card = FitnessSummary {
        calories_burned: calories,
        workout_type: Some(request.workout_type.trim().to_lowercase()),
        duration_minutes: Some(request.duration_minutes),
        steps: None,
        goal_calories_burned: day.goal_calories_burned,
        bmi: day.bmi,
    };
    state
        .publish_fitness_event(
            FitnessEvent::WorkoutCompleted,
            &user_id,
            card.clone(),
            Priority::Normal,
        )
        .await;
    state
        .publish_fitness_event(FitnessEvent::CaloriesBurned, &user_id, card, Priority::Normal)
        .await;

    Ok(Json(WorkoutResponse {
        user_id,
        workout_type: request.workout_type.trim().to_lowercase(),
        duration_minutes: request.duration_minutes,
        calories_burned: calories,
        day,
    }))
}

/// POST /exercises request body
#[derive(Debug, Deserialize)]
pub struct ExerciseRequest {
    pub user_id: String,
    /// Free-form exercise name; energy is estimated only when the MET
    /// table knows it
    pub exercise: String,
    pub duration_minutes: f64,
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

/// POST /exercises response
#[derive(Debug, Serialize)]
pub struct ExerciseResponse {
    pub user_id: String,
    pub exercise: String,
    pub duration_minutes: f64,
    /// Zero when the exercise has no MET entry; never an invented estimate
    pub calories_burned: f64,
    pub day: ActivitySnapshot,
}

/// POST /exercises - log a single exercise entry
///
/// Unlike /workouts, an unknown exercise is accepted: the entry is logged
/// and published with zero calories rather than a fabricated estimate.
pub async fn log_exercise(
    State(state): State<AppState>,
    Json(request): Json<ExerciseRequest>,
) -> ApiResult<Json<ExerciseResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    let exercise = request.exercise.trim().to_lowercase();
    if exercise.is_empty() {
        return Err(ApiError::BadRequest("exercise is required".to_string()));
    }
    if !request.duration_minutes.is_finite()
        || request.duration_minutes <= 0.0
        || request.duration_minutes > 1440.0
    {
        return Err(ApiError::BadRequest(
            "duration_minutes must be between 0 and 1440".to_string(),
        ));
    }
    let weight_kg = request
        .weight_kg
        .unwrap_or(state.config.workouts.default_weight_kg);
    if !(2.0..=500.0).contains(&weight_kg) {
        return Err(ApiError::BadRequest(
            "weight_kg must be between 2 and 500".to_string(),
        ));
    }

    let calories = match state.config.workouts.met.met_for(&exercise) {
        Some(met) => calories_burned(met, weight_kg, request.duration_minutes),
        None => 0.0,
    };

    let day = if calories > 0.0 {
        state.ledger.record_workout(&user_id, calories).await
    } else {
        state.ledger.snapshot(&user_id).await
    };

    let card = FitnessSummary {
        calories_burned: calories,
        workout_type: Some(exercise.clone()),
        duration_minutes: Some(request.duration_minutes),
        steps: None,
        goal_calories_burned: day.goal_calories_burned,
        bmi: day.bmi,
    };
    state
        .publish_fitness_event(FitnessEvent::ExerciseLogged, &user_id, card, Priority::Normal)
        .await;

    Ok(Json(ExerciseResponse {
        user_id,
        exercise,
        duration_minutes: request.duration_minutes,
        calories_burned: calories,
        day,
    }))
}

/// POST /steps request body
#[derive(Debug, Deserialize)]
pub struct StepsRequest {
    pub user_id: String,
    pub steps: u64,
}

/// POST /steps response
#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub user_id: String,
    pub steps: u64,
    pub calories_burned: f64,
    pub day: ActivitySnapshot,
}

/// POST /steps - log a step count
pub async fn log_steps(
    State(state): State<AppState>,
    Json(request): Json<StepsRequest>,
) -> ApiResult<Json<StepsResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if request.steps == 0 || request.steps > 200_000 {
        return Err(ApiError::BadRequest(
            "steps must be between 1 and 200000".to_string(),
        ));
    }

    let calories = calories_from_steps(request.steps);
    let day = state
        .ledger
        .record_steps(&user_id, request.steps, calories)
        .await;

    let card = FitnessSummary {
        calories_burned: calories,
        workout_type: None,
        duration_minutes: None,
        steps: Some(request.steps),
        goal_calories_burned: day.goal_calories_burned,
        bmi: day.bmi,
    };
    state
        .publish_fitness_event(FitnessEvent::StepsLogged, &user_id, card, Priority::Normal)
        .await;

    Ok(Json(StepsResponse {
        user_id,
        steps: request.steps,
        calories_burned: calories,
        day,
    }))
}

/// POST /goals request body
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub user_id: String,
    pub calories_burned: f64,
}

/// POST /goals response
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub user_id: String,
    pub goal_calories_burned: f64,
}

/// POST /goals - set the daily calorie-burn goal
pub async fn set_goal(
    State(state): State<AppState>,
    Json(request): Json<GoalRequest>,
) -> ApiResult<Json<GoalResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if !request.calories_burned.is_finite() || request.calories_burned <= 0.0 {
        return Err(ApiError::BadRequest(
            "calories_burned must be a positive number".to_string(),
        ));
    }

    state.ledger.set_goal(&user_id, request.calories_burned).await;

    let day = state.ledger.snapshot(&user_id).await;
    let card = FitnessSummary {
        calories_burned: day.calories_burned,
        goal_calories_burned: Some(request.calories_burned),
        bmi: day.bmi,
        ..Default::default()
    };
    state
        .publish_fitness_event(
            FitnessEvent::FitnessGoalUpdated,
            &user_id,
            card,
            Priority::High,
        )
        .await;

    Ok(Json(GoalResponse {
        user_id,
        goal_calories_burned: request.calories_burned,
    }))
}

/// GET /summary/daily query
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub user_id: String,
}

/// GET /summary/daily response
#[derive(Debug, Serialize)]
pub struct DailySummaryResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub day: ActivitySnapshot,
    /// Intake reported by the diet agent minus energy burned here
    pub net_calories: f64,
}

/// GET /summary/daily?user_id=...
pub async fn daily_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<DailySummaryResponse>> {
    let user_id = query.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }

    let day = state.ledger.snapshot(&user_id).await;

    let card = FitnessSummary {
        calories_burned: day.calories_burned,
        workout_type: None,
        duration_minutes: None,
        steps: Some(day.steps),
        goal_calories_burned: day.goal_calories_burned,
        bmi: day.bmi,
    };
    state
        .publish_fitness_event(
            FitnessEvent::DailyFitnessSummary,
            &user_id,
            card,
            Priority::Normal,
        )
        .await;

    let net_calories = day.intake_calories - day.calories_burned;
    Ok(Json(DailySummaryResponse {
        user_id,
        day,
        net_calories,
    }))
}

/// Build workout/steps/goal/summary routes
pub fn workout_routes() -> Router<AppState> {
    Router::new()
        .route("/workouts", post(log_workout))
        .route("/exercises", post(log_exercise))
        .route("/steps", post(log_steps))
        .route("/goals", post(set_goal))
        .route("/summary/daily", get(daily_summary))
}
