//! Name canonicalization and inexact matching
//!
//! One shared implementation used by both the fusion engine (merge
//! grouping) and the nutrition resolver (fuzzy lookup), so the two stages
//! can never disagree about whether two names refer to the same food.

use std::collections::{BTreeSet, HashMap};

/// Alias → canonical name mapping
///
/// Loaded once at startup (nutrition-table aliases plus operator config),
/// immutable afterwards, shared across concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    /// Build from (alias, canonical) pairs; keys and values are normalized
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let map = pairs
            .into_iter()
            .map(|(alias, canonical)| (normalize(&alias), normalize(&canonical)))
            .filter(|(alias, canonical)| !alias.is_empty() && !canonical.is_empty())
            .collect();
        Self { map }
    }

    /// Number of alias entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Canonicalize a raw label: normalize, then resolve aliases
    ///
    /// A name with no alias entry is its own canonical name; unknown foods
    /// never fail here.
    pub fn canonicalize(&self, raw: &str) -> String {
        let normalized = normalize(raw);
        match self.map.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }
}

/// Lowercase and collapse whitespace
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard overlap of whitespace-split token sets
pub fn token_jaccard(a: &str, b: &str) -> f32 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Whether one token set contains the other
fn token_subset(a: &str, b: &str) -> bool {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    set_a.is_subset(&set_b) || set_b.is_subset(&set_a)
}

/// Whether two canonical names refer to the same food
///
/// Equal names always match. Otherwise one name's tokens must be contained
/// in the other's AND the Jaccard overlap must reach `threshold` — so
/// "chicken curry" and "curry chicken" merge, while "rice" stays apart
/// from "rice pudding". Detectors rarely agree on exact wording, which is
/// why exact equality alone is not enough.
pub fn names_match(a: &str, b: &str, threshold: f32) -> bool {
    if a == b {
        return true;
    }
    token_subset(a, b) && token_jaccard(a, b) >= threshold
}

/// Title-case a canonical name for display
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  Chicken   Curry "), "chicken curry");
    }

    #[test]
    fn test_alias_resolution() {
        let aliases = AliasTable::new(vec![(
            "fries".to_string(),
            "french fries".to_string(),
        )]);
        assert_eq!(aliases.canonicalize("Fries"), "french fries");
        // No entry: the name is its own canonical
        assert_eq!(aliases.canonicalize("Dragon Fruit"), "dragon fruit");
    }

    #[test]
    fn test_token_jaccard() {
        assert_eq!(token_jaccard("chicken curry", "curry chicken"), 1.0);
        assert_eq!(token_jaccard("rice", "rice pudding"), 0.5);
        assert_eq!(token_jaccard("apple", "banana"), 0.0);
        assert_eq!(token_jaccard("", "banana"), 0.0);
    }

    #[test]
    fn test_names_match_word_order() {
        assert!(names_match("chicken curry", "curry chicken", 0.7));
    }

    #[test]
    fn test_names_match_rejects_low_overlap_subset() {
        // Subset containment alone is not enough
        assert!(!names_match("rice", "rice pudding", 0.7));
        assert!(!names_match("chicken", "chicken curry", 0.7));
    }

    #[test]
    fn test_names_match_rejects_disjoint() {
        assert!(!names_match("pizza", "salad", 0.7));
    }

    #[test]
    fn test_names_match_subset_with_high_overlap() {
        // 3 of 4 tokens shared, subset holds: 0.75 >= 0.7
        assert!(names_match(
            "spaghetti bolognese with cheese",
            "spaghetti bolognese cheese",
            0.7
        ));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("chicken curry"), "Chicken Curry");
        assert_eq!(title_case("rice"), "Rice");
    }
}
