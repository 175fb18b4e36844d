use crate::detector::LanguageDetector;
use crate::language::{resolve_language, UtteranceRequest};
use crate::screen::ScreenEvent;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Turns a submit into a detected [`UtteranceRequest`]. Detection runs on a
/// background task; its result is posted back to the screen, never applied
/// from the task itself.
pub struct InputOrchestrator {
    detector: Arc<dyn LanguageDetector>,
    fallback: String,
    in_flight: Option<JoinHandle<()>>,
    latest_request: u64,
}

impl InputOrchestrator {
    pub fn new(detector: Arc<dyn LanguageDetector>, fallback: &str) -> Self {
        Self {
            detector,
            fallback: fallback.to_string(),
            in_flight: None,
            latest_request: 0,
        }
    }

    /// Starts detection for `text` (which may be empty) and returns the
    /// request number the result will carry. Any earlier detection still
    /// running is aborted.
    pub fn on_submit(&mut self, text: String, events: UnboundedSender<ScreenEvent>) -> u64 {
        self.cancel();
        self.latest_request += 1;
        let request = self.latest_request;

        let detector = self.detector.clone();
        let fallback = self.fallback.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = detector.identify(&text).await;
            let language_code = resolve_language(outcome, &fallback);
            tracing::debug!("Request {} detected as '{}'", request, language_code);
            let _ = events.send(ScreenEvent::Detected {
                request,
                utterance: UtteranceRequest {
                    text,
                    language_code,
                },
            });
        }));
        request
    }

    /// Claims a detection result. Returns false for anything but the latest
    /// submit, so a superseded result can never reach playback.
    pub fn accept(&mut self, request: u64) -> bool {
        if request != self.latest_request {
            tracing::debug!("Dropping stale detection result {}", request);
            return false;
        }
        self.in_flight = None;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}
