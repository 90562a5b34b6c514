//! Meal analysis pipeline
//!
//! Orchestrates one request end to end: detector adapters (parallel, join
//! barrier) → fusion engine → portion/nutrition resolver. The pipeline
//! never fabricates data: zero confident detections produce an explicit
//! empty result with guidance text for the caller.

use crate::detect::{DetectorInput, DetectorSet};
use crate::fusion::FusionEngine;
use crate::nutrition::resolver::{
    MealHints, NutritionResolver, ResolutionOutcome, ResolvedFoodItem,
};
use crate::nutrition::NutritionRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Guidance returned instead of fabricated items when nothing was detected
pub const NO_DETECTION_GUIDANCE: &str =
    "No food items could be identified. Retry with a clearer photo or a short description of the meal.";

/// Result of one meal analysis
#[derive(Debug, Clone, Serialize)]
pub struct MealAnalysis {
    /// Request id for correlation
    pub analysis_id: Uuid,
    /// User the analysis belongs to
    pub user_id: String,
    /// Resolved food items, confidence-descending
    pub items: Vec<ResolvedFoodItem>,
    /// Candidates with no nutrition match, excluded from totals
    pub unresolved: Vec<String>,
    /// Nutrition totals across resolved items only
    pub totals: NutritionRecord,
    /// Detector sources that contributed to the resolved items
    pub sources: Vec<String>,
    /// Guidance text when the result is empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MealAnalysis {
    /// Whether any item resolved
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Detect → fuse → resolve pipeline for one agent process
pub struct MealAnalyzer {
    detectors: Arc<DetectorSet>,
    fusion: FusionEngine,
    resolver: NutritionResolver,
}

impl MealAnalyzer {
    /// Assemble the pipeline
    pub fn new(detectors: Arc<DetectorSet>, fusion: FusionEngine, resolver: NutritionResolver) -> Self {
        Self {
            detectors,
            fusion,
            resolver,
        }
    }

    /// Analyze one meal input
    pub async fn analyze(
        &self,
        user_id: &str,
        input: DetectorInput,
        hints: MealHints,
    ) -> MealAnalysis {
        let analysis_id = Uuid::new_v4();

        let detections = self.detectors.detect_all(&input).await;
        let candidates = self.fusion.fuse(detections);

        let mut items = Vec::new();
        let mut unresolved = Vec::new();
        for candidate in &candidates {
            match self.resolver.resolve(candidate, &hints) {
                ResolutionOutcome::Resolved(item) => items.push(*item),
                ResolutionOutcome::Unresolved { name } => unresolved.push(name),
            }
        }

        let analysis = Self::assemble(analysis_id, user_id, items, unresolved);
        info!(
            analysis_id = %analysis.analysis_id,
            user_id,
            items = analysis.items.len(),
            unresolved = analysis.unresolved.len(),
            calories = analysis.totals.calories,
            "Meal analysis complete"
        );
        analysis
    }

    /// Resolve explicitly named foods (no detection pass)
    pub fn resolve_named(
        &self,
        user_id: &str,
        foods: &[(String, MealHints)],
    ) -> MealAnalysis {
        let analysis_id = Uuid::new_v4();

        let mut items = Vec::new();
        let mut unresolved = Vec::new();
        for (name, hints) in foods {
            let candidate = self.fusion.candidate_from_name(name);
            if candidate.canonical.is_empty() {
                continue;
            }
            match self.resolver.resolve(&candidate, hints) {
                ResolutionOutcome::Resolved(item) => items.push(*item),
                ResolutionOutcome::Unresolved { name } => unresolved.push(name),
            }
        }

        Self::assemble(analysis_id, user_id, items, unresolved)
    }

    fn assemble(
        analysis_id: Uuid,
        user_id: &str,
        items: Vec<ResolvedFoodItem>,
        unresolved: Vec<String>,
    ) -> MealAnalysis {
        let mut totals = NutritionRecord::default();
        for item in &items {
            totals.accumulate(&item.nutrition);
        }

        let mut sources: Vec<String> = items
            .iter()
            .flat_map(|item| item.sources.iter().map(|s| s.as_str().to_string()))
            .collect();
        sources.sort();
        sources.dedup();

        let message = if items.is_empty() {
            Some(NO_DETECTION_GUIDANCE.to_string())
        } else {
            None
        };

        MealAnalysis {
            analysis_id,
            user_id: user_id.to_string(),
            items,
            unresolved,
            totals,
            sources,
            message,
        }
    }
}
