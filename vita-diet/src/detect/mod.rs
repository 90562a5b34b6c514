//! Detector adapters
//!
//! Each adapter wraps one black-box detection source behind a common
//! interface and normalizes its output into [`Detection`] records. Adapters
//! never error outward: a failed or timed-out call contributes an empty
//! list, and a source that could not be set up at startup reports itself
//! permanently unavailable.
//!
//! # Adapters
//! 1. **vision** - remote vision-inference endpoint (labels + boxes)
//! 2. **ocr** - remote OCR endpoint, text scanned against the food lexicon
//! 3. **keyword** - meal-description keyword matcher
//! 4. **pattern** - quantity/dish phrase matcher over the description
//!
//! # Parallel execution
//! [`DetectorSet::detect_all`] runs every available adapter concurrently
//! and joins them all before returning; fusion never starts on a partial
//! barrier. Per-adapter timeouts bound the join.

pub mod keyword;
pub mod ocr;
pub mod vision;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Detection source kind, used for confidence weighting during fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    /// Vision model label
    Vision,
    /// OCR-extracted text match
    Ocr,
    /// Meal-description keyword match
    Text,
    /// Quantity/dish phrase match
    Pattern,
}

impl DetectionSource {
    /// Wire string for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSource::Vision => "vision",
            DetectionSource::Ocr => "ocr",
            DetectionSource::Text => "text",
            DetectionSource::Pattern => "pattern",
        }
    }
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rectangle in normalized 0..1 image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Fraction of the image the box covers
    pub fn area(&self) -> f32 {
        (self.width * self.height).clamp(0.0, 1.0)
    }
}

/// One candidate food identification from one source
///
/// Created per detector call, consumed immediately by the fusion engine,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Raw label as the source produced it
    pub name: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Which source produced this detection
    pub source: DetectionSource,
    /// Where in the image the item was seen, if the source knows
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    /// Create a detection with clamped confidence
    pub fn new(name: impl Into<String>, confidence: f32, source: DetectionSource) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            bbox: None,
        }
    }

    /// Attach a bounding box
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Input for one analysis request
#[derive(Debug, Clone, Default)]
pub struct DetectorInput {
    /// Raw image bytes, if the client uploaded a photo
    pub image: Option<Vec<u8>>,
    /// Free-text meal description, if the client provided one
    pub description: Option<String>,
}

impl DetectorInput {
    /// Input from a description only
    pub fn from_text(description: impl Into<String>) -> Self {
        Self {
            image: None,
            description: Some(description.into()),
        }
    }

    /// Input from image bytes only
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            image: Some(image),
            description: None,
        }
    }
}

/// Common adapter interface over one black-box detection source
///
/// `detect` must never fail outward: a broken call degrades to an empty
/// list and the condition is logged. Unavailability is reported separately
/// through `is_available`, and an adapter whose underlying source failed to
/// set up stays unavailable for the process lifetime (no retry loop).
#[async_trait::async_trait]
pub trait DetectorAdapter: Send + Sync {
    /// Adapter name for logging and health reporting
    fn name(&self) -> &'static str;

    /// Source kind for fusion weighting
    fn source(&self) -> DetectionSource;

    /// Whether the underlying source is usable
    fn is_available(&self) -> bool;

    /// Detect food candidates in the input
    async fn detect(&self, input: &DetectorInput) -> Vec<Detection>;
}

/// Availability of one adapter, for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    /// Adapter name
    pub name: &'static str,
    /// Source kind
    pub source: DetectionSource,
    /// Whether the adapter is currently usable
    pub available: bool,
}

/// Runs all adapters for one request concurrently
///
/// This is a join barrier, not a race: every invoked adapter settles (or
/// times out) before the combined detection list is returned. Adapters
/// share no mutable state, so completion order is irrelevant.
pub struct DetectorSet {
    adapters: Vec<Arc<dyn DetectorAdapter>>,
    timeout: Duration,
}

impl DetectorSet {
    /// Create a set with a per-adapter timeout
    pub fn new(adapters: Vec<Arc<dyn DetectorAdapter>>, timeout: Duration) -> Self {
        Self { adapters, timeout }
    }

    /// Total number of adapters
    pub fn count(&self) -> usize {
        self.adapters.len()
    }

    /// Per-adapter availability for health reporting
    pub fn statuses(&self) -> Vec<DetectorStatus> {
        self.adapters
            .iter()
            .map(|a| DetectorStatus {
                name: a.name(),
                source: a.source(),
                available: a.is_available(),
            })
            .collect()
    }

    /// Invoke every available adapter and join all results
    ///
    /// A timed-out adapter contributes zero detections for this request;
    /// nothing is retried within the request.
    pub async fn detect_all(&self, input: &DetectorInput) -> Vec<Detection> {
        let futures = self
            .adapters
            .iter()
            .filter(|adapter| adapter.is_available())
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let input = input.clone();
                let timeout = self.timeout;
                async move {
                    let name = adapter.name();
                    match tokio::time::timeout(timeout, adapter.detect(&input)).await {
                        Ok(detections) => {
                            debug!(
                                adapter = name,
                                count = detections.len(),
                                "Detection pass complete"
                            );
                            detections
                        }
                        Err(_) => {
                            warn!(
                                adapter = name,
                                timeout_ms = timeout.as_millis() as u64,
                                "Detector timed out, contributing no detections"
                            );
                            Vec::new()
                        }
                    }
                }
            });

        join_all(futures).await.into_iter().flatten().collect()
    }
}

// ============================================================================
// Mock Adapter for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Mock adapter returning fixed detections
    pub struct MockDetector {
        pub name: &'static str,
        pub source: DetectionSource,
        pub detections: Vec<Detection>,
        pub available: bool,
        pub delay: Option<Duration>,
    }

    impl MockDetector {
        pub fn new(name: &'static str, source: DetectionSource, detections: Vec<Detection>) -> Self {
            Self {
                name,
                source,
                detections,
                available: true,
                delay: None,
            }
        }

        pub fn unavailable(name: &'static str, source: DetectionSource) -> Self {
            Self {
                name,
                source,
                detections: vec![],
                available: false,
                delay: None,
            }
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait::async_trait]
    impl DetectorAdapter for MockDetector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn source(&self) -> DetectionSource {
            self.source
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn detect(&self, _input: &DetectorInput) -> Vec<Detection> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.detections.clone()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
