//! Playback controller: owns the speech engine handle and the status the
//! screen displays. Every method here runs on the interaction task.

use crate::engine::{LanguageAvailability, QueueMode, SpeechEngine, UtteranceEvent};
use crate::error::SpeakError;
use crate::language::Locale;
use crate::screen::{ScreenEvent, StatusView};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

pub const ENGINE_UNAVAILABLE_NOTICE: &str = "Text to speech is not supported on this device";

pub fn unsupported_language_notice(display_language: &str) -> String {
    format!("Text to speech does not support {}", display_language)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Pending,
    Ready,
    Unavailable,
}

/// What a `speak` call did with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    Queued { utterance_id: String },
    Unsupported { display_language: String },
    /// Engine not ready (still starting, failed, or errored on submit)
    Dropped,
}

pub struct PlaybackController {
    engine: Arc<dyn SpeechEngine>,
    state: EngineState,
    status: PlaybackStatus,
    current_utterance: Option<String>,
    utterances: u64,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            state: EngineState::Pending,
            status: PlaybackStatus::Idle,
            current_utterance: None,
            utterances: 0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True when nothing is playing or about to play.
    pub fn is_settled(&self) -> bool {
        self.state != EngineState::Pending && self.current_utterance.is_none()
    }

    /// Starts engine initialization in the background. The result comes back
    /// to the screen as [`ScreenEvent::EngineReady`].
    pub fn initialize(&self, events: UnboundedSender<ScreenEvent>) -> JoinHandle<()> {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let result = engine.initialize().await;
            let _ = events.send(ScreenEvent::EngineReady(result));
        })
    }

    /// Applies the initialization result. On success, returns the channel
    /// progress notifications will arrive on.
    pub fn on_initialized(
        &mut self,
        result: Result<(), SpeakError>,
        view: &mut dyn StatusView,
    ) -> Option<UnboundedReceiver<UtteranceEvent>> {
        match result {
            Ok(()) => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.engine.set_progress_listener(tx);
                self.state = EngineState::Ready;
                tracing::info!("Speech engine initialized");
                Some(rx)
            }
            Err(e) => {
                tracing::error!("Speech engine failed to initialize: {}", e);
                self.state = EngineState::Unavailable;
                view.show_notice(ENGINE_UNAVAILABLE_NOTICE);
                None
            }
        }
    }

    pub async fn speak(
        &mut self,
        language: &str,
        text: &str,
        view: &mut dyn StatusView,
    ) -> SpeakOutcome {
        if self.state != EngineState::Ready {
            tracing::warn!("Speak ignored, engine is {:?}", self.state);
            return SpeakOutcome::Dropped;
        }

        let locale = Locale::for_language_tag(language);
        match self.engine.set_language(&locale).await {
            LanguageAvailability::Available => {}
            availability => {
                let display_language = locale.display_language();
                tracing::warn!("{} unavailable for {}: {:?}", locale, display_language, availability);
                view.show_notice(&unsupported_language_notice(&display_language));
                return SpeakOutcome::Unsupported { display_language };
            }
        }

        self.utterances += 1;
        let utterance_id = format!("utterance-{}", self.utterances);

        match self.engine.speak(text, QueueMode::Flush, &utterance_id) {
            Ok(()) => {
                tracing::info!("Queued {} ({})", utterance_id, locale);
                self.current_utterance = Some(utterance_id.clone());
                SpeakOutcome::Queued { utterance_id }
            }
            Err(e) => {
                tracing::error!("Speech engine rejected {}: {}", utterance_id, e);
                SpeakOutcome::Dropped
            }
        }
    }

    pub fn on_progress(&mut self, event: UtteranceEvent, view: &mut dyn StatusView) {
        if self.current_utterance.as_deref() != Some(event.utterance_id()) {
            tracing::debug!("Ignoring stale progress event {:?}", event);
            return;
        }

        match event {
            UtteranceEvent::Start(_) => self.set_status(PlaybackStatus::Speaking, view),
            UtteranceEvent::Done(_) => {
                self.current_utterance = None;
                self.set_status(PlaybackStatus::Idle, view);
            }
            UtteranceEvent::Error(id) => {
                // Status is left as it was
                tracing::error!("Speech engine reported an error for {}", id);
                self.current_utterance = None;
            }
        }
    }

    pub fn shutdown(&mut self) {
        if self.state == EngineState::Ready {
            self.engine.shutdown();
        }
        self.state = EngineState::Unavailable;
        self.current_utterance = None;
    }

    fn set_status(&mut self, status: PlaybackStatus, view: &mut dyn StatusView) {
        self.status = status;
        view.show_status(status);
    }
}
