//! Remote detection against a LibreTranslate-compatible `/detect` endpoint.

use super::LanguageDetector;
use crate::error::{Result, SpeakError};
use crate::language::Detection;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Candidate {
    language: String,
    /// Percent, 0-100
    #[serde(default)]
    confidence: f64,
}

pub struct ServiceDetector {
    client: Client,
    url: String,
    min_confidence: f64,
}

impl ServiceDetector {
    pub fn new(url: &str, timeout_secs: u64, min_confidence: f64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            min_confidence,
        })
    }
}

#[async_trait::async_trait]
impl LanguageDetector for ServiceDetector {
    fn id(&self) -> &'static str {
        "service"
    }

    async fn identify(&self, text: &str) -> Result<Detection> {
        if text.trim().is_empty() {
            return Ok(Detection::Undetermined);
        }

        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "q": text }))
            .send()
            .await
            .map_err(|e| SpeakError::Detection(format!("detector unreachable: {}", e)))?;

        if !resp.status().is_success() {
            return Err(SpeakError::Detection(format!(
                "detector returned HTTP {}",
                resp.status()
            )));
        }

        let mut candidates: Vec<Candidate> = resp
            .json()
            .await
            .map_err(|e| SpeakError::Detection(format!("Failed to parse detector response: {}", e)))?;

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let Some(best) = candidates.into_iter().next() else {
            return Ok(Detection::Undetermined);
        };

        tracing::debug!("detector: {} ({:.1}%)", best.language, best.confidence);

        if best.confidence / 100.0 < self.min_confidence {
            return Ok(Detection::Undetermined);
        }
        Ok(Detection::from_code(&best.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_for(server: &mockito::ServerGuard, min_confidence: f64) -> ServiceDetector {
        ServiceDetector::new(&format!("{}/detect", server.url()), 5, min_confidence).unwrap()
    }

    #[tokio::test]
    async fn test_picks_most_confident_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .match_body(mockito::Matcher::Json(json!({ "q": "Bonjour le monde" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"language":"it","confidence":12.0},{"language":"fr","confidence":91.0}]"#)
            .create_async()
            .await;

        let detector = detector_for(&server, 0.5);
        let result = detector.identify("Bonjour le monde").await.unwrap();

        assert_eq!(result, Detection::Language("fr".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_low_confidence_is_undetermined() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body(r#"[{"language":"fr","confidence":20.0}]"#)
            .create_async()
            .await;

        let detector = detector_for(&server, 0.5);
        assert_eq!(
            detector.identify("hmm").await.unwrap(),
            Detection::Undetermined
        );
    }

    #[tokio::test]
    async fn test_sentinel_and_empty_list_are_undetermined() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body(r#"[{"language":"und","confidence":100.0}]"#)
            .create_async()
            .await;
        let detector = detector_for(&server, 0.0);
        assert_eq!(detector.identify("???").await.unwrap(), Detection::Undetermined);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let detector = detector_for(&server, 0.0);
        assert_eq!(detector.identify("???").await.unwrap(), Detection::Undetermined);
    }

    #[tokio::test]
    async fn test_server_error_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(500)
            .create_async()
            .await;

        let detector = detector_for(&server, 0.5);
        assert!(matches!(
            detector.identify("Hallo").await,
            Err(SpeakError::Detection(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_detection_failure() {
        // Bind then drop a listener so the port is known to be closed
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let detector =
            ServiceDetector::new(&format!("http://127.0.0.1:{}/detect", port), 2, 0.5).unwrap();

        assert!(matches!(
            detector.identify("Hallo").await,
            Err(SpeakError::Detection(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_body_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let detector = detector_for(&server, 0.5);
        assert!(detector.identify("Hallo").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_text_skips_the_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .expect(0)
            .create_async()
            .await;

        let detector = detector_for(&server, 0.5);
        assert_eq!(detector.identify("").await.unwrap(), Detection::Undetermined);
        mock.assert_async().await;
    }
}
