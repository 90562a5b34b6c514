//! OCR detector adapter
//!
//! Wraps a remote OCR endpoint returning `{"text": "..."}` for an image
//! (menu photos, packaging). The extracted text is scanned against the
//! food lexicon; matches become detections with the `ocr` source so fusion
//! can weight them separately from direct keyword hits.

use super::keyword::FoodLexicon;
use super::{Detection, DetectionSource, DetectorAdapter, DetectorInput};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

struct OcrClient {
    endpoint: String,
    client: reqwest::Client,
}

/// Detector backed by a remote OCR endpoint plus the food lexicon
///
/// Availability semantics match the vision adapter: no endpoint means
/// permanently unavailable, a failed call means an empty list for that call
/// only.
pub struct OcrDetector {
    inner: Option<OcrClient>,
    lexicon: Arc<FoodLexicon>,
    base_confidence: f32,
}

impl OcrDetector {
    /// Create the adapter from an optional configured endpoint
    pub fn new(
        endpoint: Option<String>,
        lexicon: Arc<FoodLexicon>,
        request_timeout: Duration,
    ) -> Self {
        let inner = match endpoint {
            Some(endpoint) => match reqwest::Client::builder().timeout(request_timeout).build() {
                Ok(client) => {
                    info!(endpoint = %endpoint, "OCR detector configured");
                    Some(OcrClient { endpoint, client })
                }
                Err(e) => {
                    warn!(error = %e, "OCR client failed to build, detector disabled");
                    None
                }
            },
            None => {
                info!("No OCR endpoint configured, OCR detector disabled");
                None
            }
        };
        Self {
            inner,
            lexicon,
            base_confidence: 0.55,
        }
    }
}

#[async_trait::async_trait]
impl DetectorAdapter for OcrDetector {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Ocr
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

        let text = match response {
            Ok(response) => match response.json::<OcrResponse>().await {
                Ok(body) => body.text,
                Err(e) => {
                    warn!(error = %e, "OCR response unparseable, contributing no detections");
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!(error = %e, "OCR request failed, contributing no detections");
                return Vec::new();
            }
        };

        let detections = self
            .lexicon
            .scan(&text, DetectionSource::Ocr, self.base_confidence);
        debug!(
            text_len = text.len(),
            count = detections.len(),
            "OCR text scanned"
        );
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Arc<FoodLexicon> {
        Arc::new(FoodLexicon::new(vec![(
            "chicken curry".to_string(),
            "chicken curry".to_string(),
        )]))
    }

    #[test]
    fn test_unconfigured_endpoint_is_permanently_unavailable() {
        let detector = OcrDetector::new(None, lexicon(), Duration::from_secs(2));
        assert!(!detector.is_available());
    }

    #[tokio::test]
    async fn test_failed_call_is_empty_and_stays_available() {
        let detector = OcrDetector::new(
            Some("http://127.0.0.1:1/ocr".to_string()),
            lexicon(),
            Duration::from_millis(200),
        );
        let detections = detector
            .detect(&DetectorInput::from_image(vec![0u8; 16]))
            .await;
        assert!(detections.is_empty());
        assert!(detector.is_available());
    }
}
