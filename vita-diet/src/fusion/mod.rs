//! Multi-source detection fusion
//!
//! Combines the detection lists from all adapters invoked for one request
//! into a deduplicated, confidence-weighted candidate list. Sources differ
//! in reliability, so each detection's confidence is weighted by a static
//! per-source calibration before averaging.
//!
//! The merge is permutation-invariant: the same detection multiset produces
//! the same groups and fused confidences regardless of adapter completion
//! order. An empty input produces an empty output — zero detections are
//! reported as zero, never papered over with placeholder items.

pub mod matching;

use crate::detect::{BoundingBox, Detection, DetectionSource};
use matching::{names_match, title_case, AliasTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Static per-source confidence calibration
///
/// Vision detectors historically outperform keyword text-matching; these
/// weights encode that. Tunable configuration, not learned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWeights {
    #[serde(default = "default_vision_weight")]
    pub vision: f32,
    #[serde(default = "default_ocr_weight")]
    pub ocr: f32,
    #[serde(default = "default_text_weight")]
    pub text: f32,
    #[serde(default = "default_pattern_weight")]
    pub pattern: f32,
}

fn default_vision_weight() -> f32 {
    0.8
}
fn default_ocr_weight() -> f32 {
    0.6
}
fn default_text_weight() -> f32 {
    0.5
}
fn default_pattern_weight() -> f32 {
    0.4
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            vision: default_vision_weight(),
            ocr: default_ocr_weight(),
            text: default_text_weight(),
            pattern: default_pattern_weight(),
        }
    }
}

impl SourceWeights {
    /// Calibration weight for a source
    pub fn weight(&self, source: DetectionSource) -> f32 {
        match source {
            DetectionSource::Vision => self.vision,
            DetectionSource::Ocr => self.ocr,
            DetectionSource::Text => self.text,
            DetectionSource::Pattern => self.pattern,
        }
    }
}

/// One fused, deduplicated food candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedCandidate {
    /// Display name (title-cased canonical)
    pub name: String,
    /// Lowercase canonical name; merge key and nutrition lookup key
    pub canonical: String,
    /// Weighted combination of all contributing detection confidences
    pub confidence: f32,
    /// Sources that contributed, deduplicated
    pub sources: Vec<DetectionSource>,
    /// Box from the highest-confidence contributor that carried one
    pub bbox: Option<BoundingBox>,
}

/// Merge group under construction
struct Group {
    /// All canonical names folded into this group
    canonicals: Vec<String>,
    detections: Vec<Detection>,
    /// Lowest input index; preserves encounter order for confidence ties
    first_index: usize,
}

/// Combines detections from multiple adapters into fused candidates
pub struct FusionEngine {
    weights: SourceWeights,
    aliases: AliasTable,
    overlap_threshold: f32,
    top_k: usize,
}

impl FusionEngine {
    /// Create an engine with the given calibration and alias table
    pub fn new(
        weights: SourceWeights,
        aliases: AliasTable,
        overlap_threshold: f32,
        top_k: usize,
    ) -> Self {
        Self {
            weights,
            aliases,
            overlap_threshold: overlap_threshold.clamp(0.0, 1.0),
            top_k: top_k.max(1),
        }
    }

    /// Fuse one request's detections into candidates
    ///
    /// Steps: canonicalize → group by canonical equality → merge
    /// near-identical groups → weight-average confidence per group → sort
    /// by confidence (stable on ties, encounter order) → truncate to the
    /// top K to bound downstream nutrition lookups.
    pub fn fuse(&self, detections: Vec<Detection>) -> Vec<FusedCandidate> {
        if detections.is_empty() {
            return Vec::new();
        }

        debug!(count = detections.len(), "Starting detection fusion");

        // Exact grouping by canonical name. BTreeMap keeps the merge pass
        // deterministic for any input order.
        let mut exact: BTreeMap<String, Group> = BTreeMap::new();
        for (index, detection) in detections.into_iter().enumerate() {
            let canonical = self.aliases.canonicalize(&detection.name);
            if canonical.is_empty() {
                continue;
            }
            match exact.get_mut(&canonical) {
                Some(group) => {
                    group.first_index = group.first_index.min(index);
                    group.detections.push(detection);
                }
                None => {
                    exact.insert(
                        canonical.clone(),
                        Group {
                            canonicals: vec![canonical],
                            detections: vec![detection],
                            first_index: index,
                        },
                    );
                }
            }
        }

        // Inexact merge pass over canonically-sorted keys: fold a group into
        // the first earlier group any of whose names matches.
        let mut groups: Vec<Group> = Vec::new();
        for (canonical, mut group) in exact {
            let target = groups.iter().position(|rep| {
                rep.canonicals
                    .iter()
                    .any(|name| names_match(name, &canonical, self.overlap_threshold))
            });
            match target {
                Some(index) => {
                    let rep = &mut groups[index];
                    rep.canonicals.push(canonical);
                    rep.first_index = rep.first_index.min(group.first_index);
                    rep.detections.append(&mut group.detections);
                }
                None => groups.push(group),
            }
        }

        // Score and order: encounter order first, then stable sort by fused
        // confidence so ties keep encounter order.
        let mut fused: Vec<(usize, FusedCandidate)> = groups
            .iter()
            .map(|group| (group.first_index, self.score_group(group)))
            .collect();
        fused.sort_by_key(|(first_index, _)| *first_index);
        fused.sort_by(|(_, a), (_, b)| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut candidates: Vec<FusedCandidate> =
            fused.into_iter().map(|(_, candidate)| candidate).collect();
        candidates.truncate(self.top_k);

        debug!(groups = candidates.len(), "Detection fusion complete");
        candidates
    }

    /// Candidate for a food the user named directly (no detection pass)
    ///
    /// User-stated foods carry full confidence; they still go through the
    /// same canonicalization so logging and analysis agree on names.
    pub fn candidate_from_name(&self, raw: &str) -> FusedCandidate {
        let canonical = self.aliases.canonicalize(raw);
        FusedCandidate {
            name: title_case(&canonical),
            canonical,
            confidence: 1.0,
            sources: vec![DetectionSource::Text],
            bbox: None,
        }
    }

    /// Weighted-average confidence and metadata for one merged group
    fn score_group(&self, group: &Group) -> FusedCandidate {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for detection in &group.detections {
            let weight = self.weights.weight(detection.source);
            numerator += detection.confidence * weight;
            denominator += weight;
        }
        let confidence = if denominator > 0.0 {
            (numerator / denominator).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Most specific name wins; lexicographic tiebreak keeps the choice
        // independent of merge order
        let canonical = group
            .canonicals
            .iter()
            .min_by(|a, b| {
                let tokens_a = a.split_whitespace().count();
                let tokens_b = b.split_whitespace().count();
                tokens_b.cmp(&tokens_a).then_with(|| a.cmp(b))
            })
            .cloned()
            .unwrap_or_default();

        let bbox = group
            .detections
            .iter()
            .filter(|d| d.bbox.is_some())
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|d| d.bbox);

        let mut sources: Vec<DetectionSource> =
            group.detections.iter().map(|d| d.source).collect();
        sources.sort_by_key(|s| s.as_str());
        sources.dedup();

        FusedCandidate {
            name: title_case(&canonical),
            canonical,
            confidence,
            sources,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FusionEngine {
        FusionEngine::new(SourceWeights::default(), AliasTable::default(), 0.7, 5)
    }

    fn engine_with_aliases(pairs: Vec<(&str, &str)>) -> FusionEngine {
        let aliases = AliasTable::new(
            pairs
                .into_iter()
                .map(|(a, c)| (a.to_string(), c.to_string())),
        );
        FusionEngine::new(SourceWeights::default(), aliases, 0.7, 5)
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        // Zero detections must never be masked with fabricated items
        assert!(engine().fuse(vec![]).is_empty());
    }

    #[test]
    fn test_worked_example_chicken_curry() {
        // vision "chicken curry" 0.8 and text "curry chicken" 0.6 with
        // weights {vision: 0.8, text: 0.5} fuse into one candidate at
        // (0.8*0.8 + 0.6*0.5) / (0.8 + 0.5) ~= 0.72
        let candidates = engine().fuse(vec![
            Detection::new("chicken curry", 0.8, DetectionSource::Vision),
            Detection::new("curry chicken", 0.6, DetectionSource::Text),
        ]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Chicken Curry");
        assert!((candidates[0].confidence - 0.7230769).abs() < 1e-4);
        assert_eq!(
            candidates[0].sources,
            vec![DetectionSource::Text, DetectionSource::Vision]
        );
    }

    #[test]
    fn test_merge_is_permutation_invariant() {
        let detections = vec![
            Detection::new("chicken curry", 0.8, DetectionSource::Vision),
            Detection::new("rice", 0.7, DetectionSource::Vision),
            Detection::new("curry chicken", 0.6, DetectionSource::Text),
            Detection::new("rice", 0.5, DetectionSource::Ocr),
        ];

        let forward = engine().fuse(detections.clone());
        let mut reversed_input = detections;
        reversed_input.reverse();
        let reversed = engine().fuse(reversed_input);

        let key = |c: &FusedCandidate| (c.canonical.clone(), (c.confidence * 1e6).round() as i64);
        let mut forward_keys: Vec<_> = forward.iter().map(key).collect();
        let mut reversed_keys: Vec<_> = reversed.iter().map(key).collect();
        forward_keys.sort();
        reversed_keys.sort();
        assert_eq!(forward_keys, reversed_keys);
    }

    #[test]
    fn test_confidence_stays_in_bounds() {
        let candidates = engine().fuse(vec![
            Detection::new("pizza", 1.0, DetectionSource::Vision),
            Detection::new("pizza", 1.0, DetectionSource::Ocr),
            Detection::new("pizza", 1.0, DetectionSource::Text),
        ]);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence > 0.0 && candidates[0].confidence <= 1.0);
    }

    #[test]
    fn test_alias_collapse() {
        let engine = engine_with_aliases(vec![("fries", "french fries")]);
        let candidates = engine.fuse(vec![
            Detection::new("fries", 0.7, DetectionSource::Vision),
            Detection::new("french fries", 0.6, DetectionSource::Text),
        ]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].canonical, "french fries");
    }

    #[test]
    fn test_unknown_food_is_its_own_canonical() {
        let candidates = engine().fuse(vec![Detection::new(
            "Dragon Fruit Salad",
            0.5,
            DetectionSource::Vision,
        )]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].canonical, "dragon fruit salad");
        assert_eq!(candidates[0].name, "Dragon Fruit Salad");
    }

    #[test]
    fn test_distinct_foods_stay_separate() {
        // Shared token, but not enough overlap to merge
        let candidates = engine().fuse(vec![
            Detection::new("rice", 0.8, DetectionSource::Vision),
            Detection::new("rice pudding", 0.7, DetectionSource::Vision),
        ]);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_sorted_by_confidence_descending() {
        let candidates = engine().fuse(vec![
            Detection::new("salad", 0.4, DetectionSource::Vision),
            Detection::new("pizza", 0.9, DetectionSource::Vision),
        ]);
        assert_eq!(candidates[0].canonical, "pizza");
        assert_eq!(candidates[1].canonical, "salad");
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let candidates = engine().fuse(vec![
            Detection::new("salad", 0.6, DetectionSource::Vision),
            Detection::new("pizza", 0.6, DetectionSource::Vision),
        ]);
        assert_eq!(candidates[0].canonical, "salad");
        assert_eq!(candidates[1].canonical, "pizza");
    }

    #[test]
    fn test_top_k_truncation() {
        let engine = FusionEngine::new(SourceWeights::default(), AliasTable::default(), 0.7, 2);
        let candidates = engine.fuse(vec![
            Detection::new("pizza", 0.9, DetectionSource::Vision),
            Detection::new("salad", 0.8, DetectionSource::Vision),
            Detection::new("rice", 0.7, DetectionSource::Vision),
            Detection::new("apple", 0.6, DetectionSource::Vision),
        ]);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].canonical, "pizza");
        assert_eq!(candidates[1].canonical, "salad");
    }

    #[test]
    fn test_bbox_from_highest_confidence_contributor() {
        let bbox_low = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.2,
            height: 0.2,
        };
        let bbox_high = BoundingBox {
            x: 0.1,
            y: 0.1,
            width: 0.6,
            height: 0.6,
        };
        let candidates = engine().fuse(vec![
            Detection::new("pizza", 0.5, DetectionSource::Vision).with_bbox(bbox_low),
            Detection::new("pizza", 0.9, DetectionSource::Vision).with_bbox(bbox_high),
        ]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bbox, Some(bbox_high));
    }

    #[test]
    fn test_single_source_weighted_average_is_plain_average() {
        let candidates = engine().fuse(vec![
            Detection::new("pizza", 0.9, DetectionSource::Vision),
            Detection::new("pizza", 0.7, DetectionSource::Vision),
        ]);
        assert!((candidates[0].confidence - 0.8).abs() < 1e-6);
    }
}
