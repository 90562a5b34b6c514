//! Vision detector adapter
//!
//! Wraps a remote vision-inference endpoint. The model itself is a black
//! box; this adapter only normalizes its `[{label, confidence, bbox?}]`
//! response into [`Detection`] records.

use super::{BoundingBox, Detection, DetectionSource, DetectorAdapter, DetectorInput};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Wire shape returned by the inference endpoint
#[derive(Debug, Deserialize)]
struct WireDetection {
    label: String,
    confidence: f32,
    /// Normalized [x, y, width, height]
    #[serde(default)]
    bbox: Option<[f32; 4]>,
}

struct VisionClient {
    endpoint: String,
    client: reqwest::Client,
}

/// Detector backed by a remote vision-inference endpoint
///
/// No configured endpoint, or a client that fails to build, marks the
/// adapter permanently unavailable for the process lifetime (logged once at
/// startup, no retry loop). A single failed call only yields an empty list
/// for that call; the adapter stays available.
pub struct VisionDetector {
    inner: Option<VisionClient>,
}

impl VisionDetector {
    /// Create the adapter from an optional configured endpoint
    pub fn new(endpoint: Option<String>, request_timeout: Duration) -> Self {
        let inner = match endpoint {
            Some(endpoint) => match reqwest::Client::builder().timeout(request_timeout).build() {
                Ok(client) => {
                    info!(endpoint = %endpoint, "Vision detector configured");
                    Some(VisionClient { endpoint, client })
                }
                Err(e) => {
                    warn!(error = %e, "Vision client failed to build, detector disabled");
                    None
                }
            },
            None => {
                info!("No vision endpoint configured, vision detector disabled");
                None
            }
        };
        Self { inner }
    }
}

#[async_trait::async_trait]
impl DetectorAdapter for VisionDetector {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Vision
    }

    fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    async fn detect(&self, input: &DetectorInput) -> Vec<Detection> {
        let Some(client) = &self.inner else {
            return Vec::new();
        };
        let Some(image) = &input.image else {
            return Vec::new();
        };

        let response = client
            .client
            .post(&client.endpoint)
            .header("content-type", "application/octet-stream")
            .body(image.clone())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Vision request failed, contributing no detections");
                return Vec::new();
            }
        };

        let wire: Vec<WireDetection> = match response.json().await {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "Vision response unparseable, contributing no detections");
                return Vec::new();
            }
        };

        wire.into_iter()
            .map(|w| {
                let mut detection = Detection::new(w.label, w.confidence, DetectionSource::Vision);
                if let Some([x, y, width, height]) = w.bbox {
                    detection = detection.with_bbox(BoundingBox {
                        x,
                        y,
                        width,
                        height,
                    });
                }
                detection
            })
            .collect()
    }
}
