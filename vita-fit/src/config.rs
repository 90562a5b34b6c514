//! Configuration for the fitness agent

use crate::workout::MetTable;
use serde::Deserialize;
use vita_common::config::ChannelConfig;

/// Top-level fitness agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FitConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub workouts: WorkoutConfig,
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
    5802
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Energy-model settings
#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutConfig {
    /// MET values per workout type
    #[serde(default)]
    pub met: MetTable,
    /// Body weight assumed when a request omits one
    #[serde(default = "default_weight_kg")]
    pub default_weight_kg: f64,
}

fn default_weight_kg() -> f64 {
    crate::workout::DEFAULT_BODY_WEIGHT_KG
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            met: MetTable::default(),
            default_weight_kg: default_weight_kg(),
        }
    }
}
