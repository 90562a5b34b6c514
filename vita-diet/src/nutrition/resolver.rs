//! Portion and nutrition resolution
//!
//! Maps a fused candidate to a resolved food item: tiered nutrition lookup,
//! portion multiplier (hint keyword, else bounding-box area, else medium),
//! then cooking-method multiplier. Multipliers compose by plain
//! multiplication in that fixed order with no re-normalization.
//!
//! A candidate with no nutrition match at any tier is reported unresolved
//! and excluded from totals rather than assigned an invented default.

use super::{MatchTier, NutritionRecord, NutritionTable};
use crate::detect::{BoundingBox, DetectionSource};
use crate::fusion::FusedCandidate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Estimated portion size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portion {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl Portion {
    /// Parse a portion keyword from a request hint
    pub fn parse_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "small" | "s" => Some(Portion::Small),
            "medium" | "regular" | "m" => Some(Portion::Medium),
            "large" | "big" | "l" => Some(Portion::Large),
            "extra_large" | "extra large" | "extra-large" | "xl" => Some(Portion::ExtraLarge),
            _ => None,
        }
    }

    /// Estimate a portion from how much of the image the item covers
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        let area = bbox.area();
        if area < 0.12 {
            Portion::Small
        } else if area < 0.35 {
            Portion::Medium
        } else if area < 0.65 {
            Portion::Large
        } else {
            Portion::ExtraLarge
        }
    }

    /// Wire string for this portion
    pub fn as_str(&self) -> &'static str {
        match self {
            Portion::Small => "small",
            Portion::Medium => "medium",
            Portion::Large => "large",
            Portion::ExtraLarge => "extra_large",
        }
    }
}

/// Per-portion scaling factors; monotone small ≤ medium ≤ large ≤ extra
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortionMultipliers {
    #[serde(default = "default_small")]
    pub small: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_large")]
    pub large: f64,
    #[serde(default = "default_extra_large")]
    pub extra_large: f64,
}

fn default_small() -> f64 {
    0.7
}
fn default_medium() -> f64 {
    1.0
}
fn default_large() -> f64 {
    1.4
}
fn default_extra_large() -> f64 {
    1.8
}

impl Default for PortionMultipliers {
    fn default() -> Self {
        Self {
            small: default_small(),
            medium: default_medium(),
            large: default_large(),
            extra_large: default_extra_large(),
        }
    }
}

impl PortionMultipliers {
    /// Scaling factor for a portion
    pub fn factor(&self, portion: Portion) -> f64 {
        match portion {
            Portion::Small => self.small,
            Portion::Medium => self.medium,
            Portion::Large => self.large,
            Portion::ExtraLarge => self.extra_large,
        }
    }
}

fn one() -> f64 {
    1.0
}

/// Per-field factors for one cooking method; unspecified fields stay 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookingEffect {
    #[serde(default = "one")]
    pub calories: f64,
    #[serde(default = "one")]
    pub fat_g: f64,
    #[serde(default = "one")]
    pub sodium_mg: f64,
}

impl CookingEffect {
    fn apply(&self, mut record: NutritionRecord) -> NutritionRecord {
        record.calories *= self.calories;
        record.fat_g *= self.fat_g;
        record.sodium_mg *= self.sodium_mg;
        record
    }
}

/// Cooking-method multiplier table, keyed by lowercase method name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookingTable {
    #[serde(flatten)]
    methods: HashMap<String, CookingEffect>,
}

impl Default for CookingTable {
    fn default() -> Self {
        let mut methods = HashMap::new();
        methods.insert(
            "fried".to_string(),
            CookingEffect {
                calories: 1.3,
                fat_g: 1.3,
                sodium_mg: 1.0,
            },
        );
        methods.insert(
            "deep fried".to_string(),
            CookingEffect {
                calories: 1.5,
                fat_g: 1.6,
                sodium_mg: 1.1,
            },
        );
        methods.insert(
            "steamed".to_string(),
            CookingEffect {
                calories: 1.0,
                fat_g: 0.8,
                sodium_mg: 1.0,
            },
        );
        methods.insert(
            "grilled".to_string(),
            CookingEffect {
                calories: 1.0,
                fat_g: 0.9,
                sodium_mg: 1.0,
            },
        );
        methods.insert(
            "boiled".to_string(),
            CookingEffect {
                calories: 0.95,
                fat_g: 0.9,
                sodium_mg: 1.0,
            },
        );
        Self { methods }
    }
}

impl CookingTable {
    /// Effect for a method hint; `None` means no-op
    pub fn effect(&self, method: &str) -> Option<&CookingEffect> {
        self.methods.get(method.trim().to_lowercase().as_str())
    }
}

/// Request-level hints forwarded to resolution
#[derive(Debug, Clone, Default)]
pub struct MealHints {
    /// Portion keyword ("small", "large", ...)
    pub portion: Option<String>,
    /// Cooking method ("fried", "steamed", ...)
    pub cooking_method: Option<String>,
}

/// A fused candidate with portion and nutrition populated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFoodItem {
    /// Canonical, title-cased display name; unique within one result set
    pub name: String,
    /// Fused confidence carried over from the fusion engine
    pub confidence: f32,
    /// Food taxonomy category
    pub category: String,
    /// Portion the nutrition values are scaled to
    pub portion: Portion,
    /// Scaled nutrition values
    pub nutrition: NutritionRecord,
    /// Sources that contributed to the detection
    pub sources: Vec<DetectionSource>,
    /// Box from the strongest contributor, if any source saw one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// Outcome of resolving one candidate
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    /// Nutrition found and scaled
    Resolved(Box<ResolvedFoodItem>),
    /// No nutrition match at any tier; excluded from totals
    Unresolved {
        /// Display name of the unmatched candidate
        name: String,
    },
}

/// Resolves fused candidates against the nutrition table
pub struct NutritionResolver {
    table: Arc<NutritionTable>,
    portions: PortionMultipliers,
    cooking: CookingTable,
    overlap_threshold: f32,
}

impl NutritionResolver {
    /// Create a resolver over the shared table
    pub fn new(
        table: Arc<NutritionTable>,
        portions: PortionMultipliers,
        cooking: CookingTable,
        overlap_threshold: f32,
    ) -> Self {
        Self {
            table,
            portions,
            cooking,
            overlap_threshold,
        }
    }

    /// Resolve one candidate
    pub fn resolve(&self, candidate: &FusedCandidate, hints: &MealHints) -> ResolutionOutcome {
        let Some((entry, tier)) = self.table.resolve(&candidate.canonical, self.overlap_threshold)
        else {
            info!(
                name = %candidate.canonical,
                "No nutrition match at any tier, reporting unresolved"
            );
            return ResolutionOutcome::Unresolved {
                name: candidate.name.clone(),
            };
        };

        if tier != MatchTier::Exact {
            debug!(
                name = %candidate.canonical,
                matched = %entry.name,
                tier = ?tier,
                "Nutrition matched on a non-exact tier"
            );
        }

        let portion = hints
            .portion
            .as_deref()
            .and_then(Portion::parse_hint)
            .or_else(|| candidate.bbox.as_ref().map(Portion::from_bbox))
            .unwrap_or_default();

        // Portion first, then cooking method; plain multiplication
        let mut nutrition = entry.nutrition.scaled(self.portions.factor(portion));
        if let Some(method) = hints.cooking_method.as_deref() {
            match self.cooking.effect(method) {
                Some(effect) => nutrition = effect.apply(nutrition),
                None => debug!(method = %method, "Unknown cooking method, no multiplier applied"),
            }
        }

        ResolutionOutcome::Resolved(Box::new(ResolvedFoodItem {
            name: candidate.name.clone(),
            confidence: candidate.confidence,
            category: entry.category.clone(),
            portion,
            nutrition,
            sources: candidate.sources.clone(),
            bbox: candidate.bbox,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionSource;

    fn candidate(canonical: &str) -> FusedCandidate {
        FusedCandidate {
            name: crate::fusion::matching::title_case(canonical),
            canonical: canonical.to_string(),
            confidence: 0.8,
            sources: vec![DetectionSource::Vision],
            bbox: None,
        }
    }

    fn resolver() -> NutritionResolver {
        NutritionResolver::new(
            Arc::new(NutritionTable::builtin().unwrap()),
            PortionMultipliers::default(),
            CookingTable::default(),
            0.7,
        )
    }

    fn resolved(outcome: ResolutionOutcome) -> ResolvedFoodItem {
        match outcome {
            ResolutionOutcome::Resolved(item) => *item,
            ResolutionOutcome::Unresolved { name } => panic!("{name} did not resolve"),
        }
    }

    fn hints(portion: &str) -> MealHints {
        MealHints {
            portion: Some(portion.to_string()),
            cooking_method: None,
        }
    }

    #[test]
    fn test_large_portion_worked_example() {
        // white rice: 130 kcal medium; large multiplier 1.4 → 182 kcal
        let resolver = resolver();
        let item = resolved(resolver.resolve(&candidate("white rice"), &hints("large")));
        assert_eq!(item.portion, Portion::Large);
        assert!((item.nutrition.calories - 182.0).abs() < 1e-9);
    }

    #[test]
    fn test_portion_monotonicity() {
        let resolver = resolver();
        let small = resolved(resolver.resolve(&candidate("pizza"), &hints("small")));
        let medium = resolved(resolver.resolve(&candidate("pizza"), &hints("medium")));
        let large = resolved(resolver.resolve(&candidate("pizza"), &hints("large")));
        let extra = resolved(resolver.resolve(&candidate("pizza"), &hints("extra_large")));

        assert!(small.nutrition.calories <= medium.nutrition.calories);
        assert!(medium.nutrition.calories <= large.nutrition.calories);
        assert!(large.nutrition.calories <= extra.nutrition.calories);
    }

    #[test]
    fn test_cooking_method_applies_after_portion() {
        let resolver = resolver();
        let item = resolved(resolver.resolve(
            &candidate("white rice"),
            &MealHints {
                portion: Some("large".to_string()),
                cooking_method: Some("fried".to_string()),
            },
        ));
        // 130 * 1.4 (portion) * 1.3 (fried calories)
        assert!((item.nutrition.calories - 130.0 * 1.4 * 1.3).abs() < 1e-9);
        // fat also multiplied by the fried factor
        assert!((item.nutrition.fat_g - 0.3 * 1.4 * 1.3).abs() < 1e-9);
        // protein untouched by the cooking method
        assert!((item.nutrition.protein_g - 2.7 * 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_cooking_method_is_a_no_op() {
        let resolver = resolver();
        let plain = resolved(resolver.resolve(&candidate("pizza"), &MealHints::default()));
        let sous_vide = resolved(resolver.resolve(
            &candidate("pizza"),
            &MealHints {
                portion: None,
                cooking_method: Some("sous vide".to_string()),
            },
        ));
        assert_eq!(plain.nutrition, sous_vide.nutrition);
    }

    #[test]
    fn test_unmatched_name_is_unresolved() {
        let resolver = resolver();
        match resolver.resolve(&candidate("plutonium stew"), &MealHints::default()) {
            ResolutionOutcome::Unresolved { name } => assert_eq!(name, "Plutonium Stew"),
            ResolutionOutcome::Resolved(item) => {
                panic!("invented nutrition for {:?}", item.name)
            }
        }
    }

    #[test]
    fn test_bbox_area_drives_portion_without_hint() {
        let resolver = resolver();
        let mut big = candidate("pizza");
        big.bbox = Some(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.8,
            height: 0.7,
        });
        let item = resolved(resolver.resolve(&big, &MealHints::default()));
        assert_eq!(item.portion, Portion::Large);

        let mut small = candidate("pizza");
        small.bbox = Some(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.2,
            height: 0.2,
        });
        let item = resolved(resolver.resolve(&small, &MealHints::default()));
        assert_eq!(item.portion, Portion::Small);
    }

    #[test]
    fn test_hint_overrides_bbox() {
        let resolver = resolver();
        let mut big = candidate("pizza");
        big.bbox = Some(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.9,
            height: 0.9,
        });
        let item = resolved(resolver.resolve(&big, &hints("small")));
        assert_eq!(item.portion, Portion::Small);
    }

    #[test]
    fn test_default_portion_is_medium_at_factor_one() {
        let resolver = resolver();
        let item = resolved(resolver.resolve(&candidate("banana"), &MealHints::default()));
        assert_eq!(item.portion, Portion::Medium);
        assert!((item.nutrition.calories - 105.0).abs() < 1e-9);
    }
}
