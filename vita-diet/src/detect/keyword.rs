//! Text-based detectors
//!
//! [`KeywordDetector`] matches a meal description against the food lexicon.
//! [`PatternDetector`] matches quantity-prefixed dish phrases ("two eggs",
//! "a bowl of rice"). Both are pure in-process matchers and therefore
//! always available.

use super::{Detection, DetectionSource, DetectorAdapter, DetectorInput};
use std::sync::Arc;
use tracing::debug;

/// One matchable phrase with its canonical food name
#[derive(Debug, Clone)]
pub struct LexiconTerm {
    /// Lowercased phrase as it may appear in text
    pub phrase: String,
    /// Canonical food name the phrase refers to
    pub canonical: String,
}

/// Flat list of matchable food phrases (names plus aliases)
///
/// Built once at startup from the nutrition table, immutable afterwards,
/// shared across concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct FoodLexicon {
    /// Terms sorted longest-phrase-first so greedy matching prefers the
    /// most specific phrase
    terms: Vec<LexiconTerm>,
}

impl FoodLexicon {
    /// Build a lexicon from (phrase, canonical) pairs
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let mut terms: Vec<LexiconTerm> = pairs
            .into_iter()
            .map(|(phrase, canonical)| LexiconTerm {
                phrase: phrase.trim().to_lowercase(),
                canonical: canonical.trim().to_lowercase(),
            })
            .filter(|term| !term.phrase.is_empty())
            .collect();
        terms.sort_by(|a, b| {
            b.phrase
                .len()
                .cmp(&a.phrase.len())
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        Self { terms }
    }

    /// Number of matchable phrases
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the lexicon holds no phrases
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Scan free text for food phrases
    ///
    /// Greedy longest-phrase-first matching on word boundaries; a phrase
    /// fully inside an already-matched span is suppressed so "chicken
    /// curry" does not also yield "chicken" and "curry". Confidence grows
    /// slightly with phrase specificity.
    pub fn scan(&self, text: &str, source: DetectionSource, base_confidence: f32) -> Vec<Detection> {
        let haystack = text.to_lowercase();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut detections = Vec::new();

        for term in &self.terms {
            for start in find_word_bounded(&haystack, &term.phrase) {
                let end = start + term.phrase.len();
                if spans.iter().any(|&(s, e)| start >= s && end <= e) {
                    continue;
                }
                spans.push((start, end));
                let tokens = term.phrase.split_whitespace().count();
                let confidence =
                    (base_confidence + 0.05 * (tokens.saturating_sub(1)) as f32).min(0.95);
                detections.push(Detection::new(term.phrase.clone(), confidence, source));
            }
        }

        detections
    }
}

/// Byte offsets where `needle` occurs in `haystack` on word boundaries
fn find_word_bounded(haystack: &str, needle: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(found) = haystack[from..].find(needle) {
        let start = from + found;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            positions.push(start);
        }
        from = end;
        if from >= haystack.len() {
            break;
        }
    }
    positions
}

/// Matches the meal description against the food lexicon
pub struct KeywordDetector {
    lexicon: Arc<FoodLexicon>,
    base_confidence: f32,
}

impl KeywordDetector {
    /// Create a keyword detector over the shared lexicon
    pub fn new(lexicon: Arc<FoodLexicon>) -> Self {
        Self {
            lexicon,
            base_confidence: 0.6,
        }
    }
}

#[async_trait::async_trait]
impl DetectorAdapter for KeywordDetector {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Text
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn detect(&self, input: &DetectorInput) -> Vec<Detection> {
        let Some(description) = input.description.as_deref() else {
            return Vec::new();
        };
        let detections = self
            .lexicon
            .scan(description, DetectionSource::Text, self.base_confidence);
        debug!(count = detections.len(), "Keyword scan complete");
        detections
    }
}

/// Quantity tokens that introduce a dish phrase
const QUANTITY_WORDS: &[&str] = &[
    "a", "an", "one", "two", "three", "four", "five", "six", "some", "half",
];

/// Matches quantity-prefixed dish phrases in the description
///
/// Phrases like "two eggs" or "3 slices of pizza" carry a stronger signal
/// than a bare keyword hit: the user is enumerating the meal, not merely
/// mentioning a food.
pub struct PatternDetector {
    lexicon: Arc<FoodLexicon>,
    base_confidence: f32,
}

impl PatternDetector {
    /// Create a pattern detector over the shared lexicon
    pub fn new(lexicon: Arc<FoodLexicon>) -> Self {
        Self {
            lexicon,
            base_confidence: 0.65,
        }
    }

    fn is_quantity(word: &str) -> bool {
        word.chars().all(|c| c.is_ascii_digit()) && !word.is_empty()
            || QUANTITY_WORDS.contains(&word)
    }
}

#[async_trait::async_trait]
impl DetectorAdapter for PatternDetector {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Pattern
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn detect(&self, input: &DetectorInput) -> Vec<Detection> {
        let Some(description) = input.description.as_deref() else {
            return Vec::new();
        };
        let text = description.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut detections = Vec::new();
        for (i, word) in words.iter().enumerate() {
            if !Self::is_quantity(word) {
                continue;
            }
            // Filler between the quantity and the dish ("of", "bowls of")
            let mut start = i + 1;
            while start < words.len() && matches!(words[start], "of" | "bowl" | "bowls" | "plate" | "plates" | "slice" | "slices" | "cup" | "cups" | "piece" | "pieces") {
                start += 1;
            }
            // Longest lexicon phrase beginning at `start`
            for take in (1..=3usize).rev() {
                if start + take > words.len() {
                    continue;
                }
                let phrase = words[start..start + take].join(" ");
                if self.lexicon.terms.iter().any(|t| t.phrase == phrase) {
                    let confidence =
                        (self.base_confidence + 0.05 * (take - 1) as f32).min(0.9);
                    detections.push(Detection::new(phrase, confidence, DetectionSource::Pattern));
                    break;
                }
            }
        }

        debug!(count = detections.len(), "Pattern scan complete");
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Arc<FoodLexicon> {
        Arc::new(FoodLexicon::new(vec![
            ("chicken curry".to_string(), "chicken curry".to_string()),
            ("curry chicken".to_string(), "chicken curry".to_string()),
            ("chicken".to_string(), "chicken breast".to_string()),
            ("rice".to_string(), "white rice".to_string()),
            ("eggs".to_string(), "eggs".to_string()),
            ("pizza".to_string(), "pizza".to_string()),
        ]))
    }

    #[tokio::test]
    async fn test_keyword_matches_longest_phrase_first() {
        let detector = KeywordDetector::new(lexicon());
        let detections = detector
            .detect(&DetectorInput::from_text("I had chicken curry with rice"))
            .await;

        let names: Vec<&str> = detections.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"chicken curry"));
        assert!(names.contains(&"rice"));
        // "chicken" alone is suppressed inside the longer match
        assert!(!names.contains(&"chicken"));
    }

    #[tokio::test]
    async fn test_keyword_respects_word_boundaries() {
        let detector = KeywordDetector::new(lexicon());
        // "ricecake" must not match "rice"
        let detections = detector
            .detect(&DetectorInput::from_text("a ricecake snack"))
            .await;
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_without_description_is_empty() {
        let detector = KeywordDetector::new(lexicon());
        let detections = detector.detect(&DetectorInput::default()).await;
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_pattern_matches_quantity_phrases() {
        let detector = PatternDetector::new(lexicon());
        let detections = detector
            .detect(&DetectorInput::from_text("two eggs and a bowl of rice"))
            .await;

        let names: Vec<&str> = detections.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"eggs"));
        assert!(names.contains(&"rice"));
        for d in &detections {
            assert_eq!(d.source, DetectionSource::Pattern);
        }
    }

    #[tokio::test]
    async fn test_pattern_ignores_unquantified_mentions() {
        let detector = PatternDetector::new(lexicon());
        let detections = detector
            .detect(&DetectorInput::from_text("pizza was great"))
            .await;
        assert!(detections.is_empty());
    }

    #[test]
    fn test_multiword_phrase_confidence_is_higher() {
        let lex = lexicon();
        let detections = lex.scan("chicken curry and rice", DetectionSource::Text, 0.6);
        let curry = detections.iter().find(|d| d.name == "chicken curry").unwrap();
        let rice = detections.iter().find(|d| d.name == "rice").unwrap();
        assert!(curry.confidence > rice.confidence);
    }
}
