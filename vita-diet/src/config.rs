//! Configuration for the diet agent
//!
//! All tunables live here with compiled defaults: the agent runs with no
//! config file at all. The fuzzy-match threshold and per-source weights are
//! deliberately configuration, not constants scattered through the code.

use crate::fusion::SourceWeights;
use crate::nutrition::resolver::{CookingTable, PortionMultipliers};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use vita_common::config::ChannelConfig;

/// Top-level diet agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DietConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub detectors: DetectorsConfig,
    #[serde(default)]
    pub fusion: FusionSettings,
    #[serde(default)]
    pub nutrition: NutritionConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5801
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Detector endpoints, timeout, and per-source calibration weights
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorsConfig {
    /// Vision-inference endpoint; unset disables the vision adapter
    #[serde(default)]
    pub vision_endpoint: Option<String>,
    /// OCR endpoint; unset disables the OCR adapter
    #[serde(default)]
    pub ocr_endpoint: Option<String>,
    /// Per-adapter timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Static per-source confidence weights for fusion
    #[serde(default)]
    pub weights: SourceWeights,
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            vision_endpoint: None,
            ocr_endpoint: None,
            timeout_ms: default_timeout_ms(),
            weights: SourceWeights::default(),
        }
    }
}

/// Fusion engine tunables
#[derive(Debug, Clone, Deserialize)]
pub struct FusionSettings {
    /// Maximum resolved items per request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Token-overlap threshold for inexact name matching
    #[serde(default = "default_overlap_threshold")]
    pub token_overlap_threshold: f32,
    /// Extra alias → canonical entries merged over the nutrition table's
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_top_k() -> usize {
    5
}
fn default_overlap_threshold() -> f32 {
    0.7
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            token_overlap_threshold: default_overlap_threshold(),
            aliases: HashMap::new(),
        }
    }
}

/// Nutrition table and multiplier settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NutritionConfig {
    /// Replacement nutrition table; unset uses the built-in dataset
    #[serde(default)]
    pub table_path: Option<PathBuf>,
    /// Portion scaling factors
    #[serde(default)]
    pub portions: PortionMultipliers,
    /// Cooking-method multiplier table
    #[serde(default)]
    pub cooking: CookingTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let config = DietConfig::default();
        assert_eq!(config.http.port, 5801);
        assert_eq!(config.fusion.top_k, 5);
        assert!((config.fusion.token_overlap_threshold - 0.7).abs() < 1e-6);
        assert!(config.detectors.vision_endpoint.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DietConfig = toml::from_str(
            r#"
            [http]
            port = 9000

            [detectors]
            vision_endpoint = "http://localhost:8500/detect"

            [detectors.weights]
            vision = 0.9

            [fusion.aliases]
            "chips" = "french fries"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.bind, "127.0.0.1");
        assert_eq!(
            config.detectors.vision_endpoint.as_deref(),
            Some("http://localhost:8500/detect")
        );
        assert!((config.detectors.weights.vision - 0.9).abs() < 1e-6);
        // Unspecified weights keep their defaults
        assert!((config.detectors.weights.text - 0.5).abs() < 1e-6);
        assert_eq!(config.fusion.aliases["chips"], "french fries");
    }
}
