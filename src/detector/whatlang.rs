//! On-device detection using the `whatlang` trigram classifier.

use super::LanguageDetector;
use crate::error::{Result, SpeakError};
use crate::language::{iso639_3_to_bcp47, Detection};

pub struct WhatlangDetector {
    min_confidence: f64,
}

impl WhatlangDetector {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    fn classify(text: &str, min_confidence: f64) -> Detection {
        if text.trim().is_empty() {
            return Detection::Undetermined;
        }

        let Some(info) = ::whatlang::detect(text) else {
            return Detection::Undetermined;
        };

        if info.confidence() < min_confidence {
            tracing::debug!(
                "whatlang: {} below confidence floor ({:.2} < {:.2})",
                info.lang().code(),
                info.confidence(),
                min_confidence
            );
            return Detection::Undetermined;
        }

        match iso639_3_to_bcp47(info.lang().code()) {
            Some(code) => Detection::Language(code.to_string()),
            None => Detection::Undetermined,
        }
    }
}

#[async_trait::async_trait]
impl LanguageDetector for WhatlangDetector {
    fn id(&self) -> &'static str {
        "whatlang"
    }

    async fn identify(&self, text: &str) -> Result<Detection> {
        let text = text.to_string();
        let min_confidence = self.min_confidence;

        // Trigram scoring is CPU-bound, keep it off the async workers
        tokio::task::spawn_blocking(move || Self::classify(&text, min_confidence))
            .await
            .map_err(|e| SpeakError::Detection(format!("classifier task failed: {}", e)))
    }
}
