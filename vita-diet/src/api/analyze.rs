//! Meal analysis endpoint
//!
//! Accepts a multipart request with an optional `image` part and form
//! fields (`user_id`, `description`, `portion`, `cooking_method`, `log`),
//! runs the detect → fuse → resolve pipeline, and returns the analysis.
//! Zero detections return an explicit empty result with guidance text.

use crate::analysis::MealAnalysis;
use crate::detect::DetectorInput;
use crate::error::{ApiError, ApiResult};
use crate::nutrition::resolver::MealHints;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::debug;
use vita_common::envelope::DietSummary;
use vita_common::events::{AgentActivity, DietEvent, Priority};

/// Parsed multipart form for one analysis request
#[derive(Default)]
struct AnalyzeForm {
    image: Option<Vec<u8>>,
    user_id: Option<String>,
    description: Option<String>,
    portion: Option<String>,
    cooking_method: Option<String>,
    log_meal: bool,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<AnalyzeForm> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("bad multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable image part: {e}")))?;
                if !bytes.is_empty() {
                    form.image = Some(bytes.to_vec());
                }
            }
            Some("user_id") => {
                form.user_id = Some(read_text(field).await?);
            }
            Some("description") => {
                let text = read_text(field).await?;
                if !text.trim().is_empty() {
                    form.description = Some(text);
                }
            }
            Some("portion") => {
                form.portion = Some(read_text(field).await?);
            }
            Some("cooking_method") => {
                form.cooking_method = Some(read_text(field).await?);
            }
            Some("log") => {
                let text = read_text(field).await?;
                form.log_meal = matches!(text.trim(), "true" | "1" | "yes");
            }
            other => {
                debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable form field: {e}")))
}

/// POST /analyze
pub async fn analyze_meal(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<MealAnalysis>> {
    let form = read_form(multipart).await?;

    let user_id = form
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;

    if form.image.is_none() && form.description.is_none() {
        return Err(ApiError::BadRequest(
            "provide an image or a description".to_string(),
        ));
    }

    // Image-only request with every image-capable detector down is a
    // dependency failure, not an empty analysis
    if form.description.is_none() {
        let image_capable = state
            .detectors
            .statuses()
            .iter()
            .any(|s| s.available && matches!(s.name, "vision" | "ocr"));
        if !image_capable {
            return Err(ApiError::Unavailable(
                "no image detector is available; provide a text description".to_string(),
            ));
        }
    }

    let input = DetectorInput {
        image: form.image,
        description: form.description,
    };
    let hints = MealHints {
        portion: form.portion,
        cooking_method: form.cooking_method,
    };

    let analysis = state.analyzer.analyze(&user_id, input, hints).await;

    state.activity.emit_lossy(AgentActivity::AnalysisCompleted {
        analysis_id: analysis.analysis_id,
        user_id: user_id.clone(),
        item_count: analysis.items.len(),
        total_calories: analysis.totals.calories,
        timestamp: chrono::Utc::now(),
    });

    if !analysis.is_empty() {
        let card = DietSummary {
            calories: analysis.totals.calories,
            protein_g: analysis.totals.protein_g,
            carbs_g: analysis.totals.carbs_g,
            fat_g: analysis.totals.fat_g,
            meal_count: 1,
            goal_calories: None,
            bmi: None,
            sources: analysis.sources.clone(),
        };
        state
            .publish_diet_event(DietEvent::FoodAnalyzed, &user_id, card.clone(), Priority::Normal)
            .await;

        if form.log_meal {
            let snapshot = state.ledger.record_meal(&user_id, &analysis.totals).await;
            let logged_card = DietSummary {
                meal_count: snapshot.meal_count,
                goal_calories: snapshot.goal_calories,
                bmi: snapshot.bmi,
                ..card
            };
            state
                .publish_diet_event(DietEvent::MealLogged, &user_id, logged_card, Priority::Normal)
                .await;
        }
    }

    Ok(Json(analysis))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze_meal))
}
