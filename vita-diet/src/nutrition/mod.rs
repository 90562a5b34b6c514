//! Nutrition table and lookup
//!
//! The table is loaded once at process start (built-in dataset or an
//! operator-supplied TOML file), immutable after load, and shared across
//! concurrent requests without locking.
//!
//! Lookup runs in tiers: exact canonical match, then alias match, then the
//! same token-overlap fuzzy match the fusion engine uses. A name that
//! misses every tier is reported unresolved; nothing is ever defaulted.

pub mod resolver;

use crate::detect::keyword::FoodLexicon;
use crate::fusion::matching::{names_match, normalize, token_jaccard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use vita_common::{Error, Result};

/// Per-serving nutrition values
///
/// All fields scale together under portion and cooking multipliers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
    #[serde(default)]
    pub sodium_mg: f64,
    #[serde(default)]
    pub sugar_g: f64,
}

impl NutritionRecord {
    /// Every scalar field multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein_g: self.protein_g * factor,
            carbs_g: self.carbs_g * factor,
            fat_g: self.fat_g * factor,
            fiber_g: self.fiber_g * factor,
            sodium_mg: self.sodium_mg * factor,
            sugar_g: self.sugar_g * factor,
        }
    }

    /// Accumulate another record into this one (for meal totals)
    pub fn accumulate(&mut self, other: &NutritionRecord) {
        self.calories += other.calories;
        self.protein_g += other.protein_g;
        self.carbs_g += other.carbs_g;
        self.fat_g += other.fat_g;
        self.fiber_g += other.fiber_g;
        self.sodium_mg += other.sodium_mg;
        self.sugar_g += other.sugar_g;
    }
}

/// One food in the nutrition table
#[derive(Debug, Clone, Deserialize)]
pub struct FoodEntry {
    /// Canonical name (lowercased on load)
    pub name: String,
    /// Food taxonomy category
    pub category: String,
    /// Alternate names that resolve to this entry
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Per-medium-serving values
    pub nutrition: NutritionRecord,
}

/// Which lookup tier matched, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Alias,
    Fuzzy,
}

#[derive(Deserialize)]
struct FoodsFile {
    #[serde(default)]
    foods: Vec<FoodEntry>,
}

/// Immutable nutrition lookup table
pub struct NutritionTable {
    foods: Vec<FoodEntry>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl NutritionTable {
    /// Parse the compiled-in default dataset
    pub fn builtin() -> Result<Self> {
        Self::from_toml(include_str!("default_foods.toml"))
    }

    /// Load from an operator-supplied file, or the built-in dataset
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                info!(path = %path.display(), "Loading nutrition table");
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read nutrition table {}: {e}", path.display()))
                })?;
                Self::from_toml(&content)
            }
            None => Self::builtin(),
        }
    }

    /// Parse a TOML foods document
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: FoodsFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad nutrition table: {e}")))?;

        let mut foods = file.foods;
        for food in &mut foods {
            food.name = normalize(&food.name);
            for alias in &mut food.aliases {
                *alias = normalize(alias);
            }
        }

        let mut by_name = HashMap::new();
        let mut by_alias = HashMap::new();
        for (index, food) in foods.iter().enumerate() {
            by_name.insert(food.name.clone(), index);
            for alias in &food.aliases {
                by_alias.entry(alias.clone()).or_insert(index);
            }
        }

        debug!(foods = foods.len(), "Nutrition table loaded");
        Ok(Self {
            foods,
            by_name,
            by_alias,
        })
    }

    /// Number of foods in the table
    pub fn len(&self) -> usize {
        self.foods.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }

    /// Exact canonical-name lookup
    pub fn lookup(&self, canonical: &str) -> Option<&FoodEntry> {
        self.by_name.get(canonical).map(|&i| &self.foods[i])
    }

    /// Tiered lookup: exact, then alias, then token-overlap fuzzy
    ///
    /// The fuzzy tier reuses the fusion matcher, so lookup and merge can
    /// never disagree about name identity. Among fuzzy candidates the best
    /// Jaccard score wins; ties keep table order.
    pub fn resolve(&self, canonical: &str, overlap_threshold: f32) -> Option<(&FoodEntry, MatchTier)> {
        if let Some(&index) = self.by_name.get(canonical) {
            return Some((&self.foods[index], MatchTier::Exact));
        }
        if let Some(&index) = self.by_alias.get(canonical) {
            return Some((&self.foods[index], MatchTier::Alias));
        }

        let mut best: Option<(usize, f32)> = None;
        for (index, food) in self.foods.iter().enumerate() {
            let names = std::iter::once(&food.name).chain(food.aliases.iter());
            for name in names {
                if names_match(name, canonical, overlap_threshold) {
                    let score = token_jaccard(name, canonical);
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((index, score));
                    }
                }
            }
        }
        best.map(|(index, _)| (&self.foods[index], MatchTier::Fuzzy))
    }

    /// All matchable phrases (names plus aliases) for the text detectors
    pub fn lexicon(&self) -> FoodLexicon {
        let mut pairs = Vec::new();
        for food in &self.foods {
            pairs.push((food.name.clone(), food.name.clone()));
            for alias in &food.aliases {
                pairs.push((alias.clone(), food.name.clone()));
            }
        }
        FoodLexicon::new(pairs)
    }

    /// (alias, canonical) pairs for the fusion alias table
    pub fn alias_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for food in &self.foods {
            for alias in &food.aliases {
                pairs.push((alias.clone(), food.name.clone()));
            }
        }
        pairs
    }
}
