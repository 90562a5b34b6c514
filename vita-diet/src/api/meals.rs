//! Meal logging, daily summary, goals, and BMI endpoints

use crate::analysis::MealAnalysis;
use crate::error::{ApiError, ApiResult};
use crate::ledger::DaySnapshot;
use crate::nutrition::resolver::MealHints;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use vita_common::envelope::DietSummary;
use vita_common::events::{DietEvent, Priority};

/// One explicitly named food in a meal log
#[derive(Debug, Deserialize)]
pub struct NamedFood {
    pub name: String,
    #[serde(default)]
    pub portion: Option<String>,
    #[serde(default)]
    pub cooking_method: Option<String>,
}

/// POST /meals request body
#[derive(Debug, Deserialize)]
pub struct LogMealRequest {
    pub user_id: String,
    pub foods: Vec<NamedFood>,
}

/// POST /meals response
#[derive(Debug, Serialize)]
pub struct LogMealResponse {
    #[serde(flatten)]
    pub analysis: MealAnalysis,
    /// Day totals after this meal
    pub day: DaySnapshot,
}

/// POST /meals - log a meal from named foods (no image)
pub async fn log_meal(
    State(state): State<AppState>,
    Json(request): Json<LogMealRequest>,
) -> ApiResult<Json<LogMealResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if request.foods.is_empty() {
        return Err(ApiError::BadRequest("foods must not be empty".to_string()));
    }

    let foods: Vec<(String, MealHints)> = request
        .foods
        .into_iter()
        .map(|food| {
            (
                food.name,
                MealHints {
                    portion: food.portion,
                    cooking_method: food.cooking_method,
                },
            )
        })
        .collect();

    let analysis = state.analyzer.resolve_named(&user_id, &foods);

    let day = if analysis.is_empty() {
        state.ledger.snapshot(&user_id).await
    } else {
        let day = state.ledger.record_meal(&user_id, &analysis.totals).await;
        let card = DietSummary {
            calories: analysis.totals.calories,
            protein_g: analysis.totals.protein_g,
            carbs_g: analysis.totals.carbs_g,
            fat_g: analysis.totals.fat_g,
            meal_count: day.meal_count,
            goal_calories: day.goal_calories,
            bmi: day.bmi,
            sources: analysis.sources.clone(),
        };
        state
            .publish_diet_event(DietEvent::MealLogged, &user_id, card, Priority::Normal)
            .await;

        let daily_card = DietSummary {
            calories: day.intake.calories,
            protein_g: day.intake.protein_g,
            carbs_g: day.intake.carbs_g,
            fat_g: day.intake.fat_g,
            meal_count: day.meal_count,
            goal_calories: day.goal_calories,
            bmi: day.bmi,
            sources: vec![],
        };
        state
            .publish_diet_event(DietEvent::NutritionUpdated, &user_id, daily_card, Priority::Normal)
            .await;
        day
    };

    Ok(Json(LogMealResponse { analysis, day }))
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
    pub day: DaySnapshot,
    /// Intake minus energy credited back by the fitness agent
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

    let card = DietSummary {
        calories: day.intake.calories,
        protein_g: day.intake.protein_g,
        carbs_g: day.intake.carbs_g,
        fat_g: day.intake.fat_g,
        meal_count: day.meal_count,
        goal_calories: day.goal_calories,
        bmi: day.bmi,
        sources: vec![],
    };
    state
        .publish_diet_event(DietEvent::DailyNutritionSummary, &user_id, card, Priority::Normal)
        .await;

    let net_calories = day.intake.calories - day.calories_burned;
    Ok(Json(DailySummaryResponse {
        user_id,
        day,
        net_calories,
    }))
}

/// POST /goals request body
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub user_id: String,
    pub calories: f64,
}

/// POST /goals response
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub user_id: String,
    pub goal_calories: f64,
}

/// POST /goals - set the daily calorie goal
pub async fn set_goal(
    State(state): State<AppState>,
    Json(request): Json<GoalRequest>,
) -> ApiResult<Json<GoalResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if !request.calories.is_finite() || request.calories <= 0.0 {
        return Err(ApiError::BadRequest(
            "calories must be a positive number".to_string(),
        ));
    }

    state.ledger.set_goal(&user_id, request.calories).await;

    let day = state.ledger.snapshot(&user_id).await;
    let card = DietSummary {
        calories: day.intake.calories,
        meal_count: day.meal_count,
        goal_calories: Some(request.calories),
        bmi: day.bmi,
        ..Default::default()
    };
    // Goal changes should be applied promptly by the fitness agent
    state
        .publish_diet_event(DietEvent::NutritionGoalUpdated, &user_id, card, Priority::High)
        .await;

    Ok(Json(GoalResponse {
        user_id,
        goal_calories: request.calories,
    }))
}

/// POST /bmi request body
#[derive(Debug, Deserialize)]
pub struct BmiRequest {
    pub user_id: String,
    pub height_cm: f64,
    pub weight_kg: f64,
}

/// POST /bmi response
#[derive(Debug, Serialize)]
pub struct BmiResponse {
    pub user_id: String,
    pub bmi: f64,
    pub category: String,
}

/// BMI category per standard WHO cut-offs
fn bmi_category(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        "underweight"
    } else if bmi < 25.0 {
        "normal"
    } else if bmi < 30.0 {
        "overweight"
    } else {
        "obese"
    }
}

/// POST /bmi - compute and record BMI
pub async fn calculate_bmi(
    State(state): State<AppState>,
    Json(request): Json<BmiRequest>,
) -> ApiResult<Json<BmiResponse>> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if !(30.0..=300.0).contains(&request.height_cm) {
        return Err(ApiError::BadRequest(
            "height_cm must be between 30 and 300".to_string(),
        ));
    }
    if !(2.0..=500.0).contains(&request.weight_kg) {
        return Err(ApiError::BadRequest(
            "weight_kg must be between 2 and 500".to_string(),
        ));
    }

    let height_m = request.height_cm / 100.0;
    let bmi = ((request.weight_kg / (height_m * height_m)) * 10.0).round() / 10.0;

    state.ledger.set_bmi(&user_id, bmi).await;

    let card = DietSummary {
        bmi: Some(bmi),
        ..Default::default()
    };
    state
        .publish_diet_event(DietEvent::BmiCalculated, &user_id, card, Priority::Normal)
        .await;

    Ok(Json(BmiResponse {
        user_id,
        bmi,
        category: bmi_category(bmi).to_string(),
    }))
}

/// Build meal/summary/goal/BMI routes
pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(log_meal))
        .route("/summary/daily", get(daily_summary))
        .route("/goals", post(set_goal))
        .route("/bmi", post(calculate_bmi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_categories() {
        assert_eq!(bmi_category(17.0), "underweight");
        assert_eq!(bmi_category(22.0), "normal");
        assert_eq!(bmi_category(27.0), "overweight");
        assert_eq!(bmi_category(33.0), "obese");
    }
}
