//! The interaction loop. One task owns the status label, the playback
//! controller and the orchestrator; background work reaches it only as
//! [`ScreenEvent`]s.

use crate::engine::UtteranceEvent;
use crate::error::SpeakError;
use crate::language::UtteranceRequest;
use crate::orchestrator::InputOrchestrator;
use crate::playback::{PlaybackController, PlaybackStatus};
use std::future::pending;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// The user-facing surface: a read-only status label plus transient notices.
pub trait StatusView: Send {
    fn show_status(&mut self, status: PlaybackStatus);
    fn show_notice(&mut self, message: &str);
}

pub fn status_label(status: PlaybackStatus) -> &'static str {
    match status {
        PlaybackStatus::Speaking => "Status: listening...",
        PlaybackStatus::Idle => "Status: listening done",
    }
}

/// Renders the label and notices to the terminal.
#[derive(Default)]
pub struct TerminalView;

impl StatusView for TerminalView {
    fn show_status(&mut self, status: PlaybackStatus) {
        println!("{}", status_label(status));
    }

    fn show_notice(&mut self, message: &str) {
        println!("! {}", message);
    }
}

pub enum ScreenEvent {
    /// The button: submit whatever is in the input field
    Submit(String),
    EngineReady(Result<(), SpeakError>),
    Detected {
        request: u64,
        utterance: UtteranceRequest,
    },
    /// Tear down once nothing is pending
    CloseWhenIdle,
    /// Tear down now
    Close,
}

/// Cloneable way for the outside world (input reader, CLI) to talk to a
/// running screen.
#[derive(Clone)]
pub struct ScreenHandle {
    tx: UnboundedSender<ScreenEvent>,
}

impl ScreenHandle {
    pub fn submit(&self, text: impl Into<String>) -> bool {
        self.tx.send(ScreenEvent::Submit(text.into())).is_ok()
    }

    pub fn close_when_idle(&self) -> bool {
        self.tx.send(ScreenEvent::CloseWhenIdle).is_ok()
    }

    pub fn close(&self) -> bool {
        self.tx.send(ScreenEvent::Close).is_ok()
    }
}

pub struct Screen<V: StatusView> {
    controller: PlaybackController,
    orchestrator: InputOrchestrator,
    view: V,
    events_tx: UnboundedSender<ScreenEvent>,
    events_rx: UnboundedReceiver<ScreenEvent>,
    progress_rx: Option<UnboundedReceiver<UtteranceEvent>>,
    /// Latest request that arrived before the engine finished starting
    deferred: Option<UtteranceRequest>,
    init_task: Option<JoinHandle<()>>,
    closing: bool,
}

enum Step {
    Event(Option<ScreenEvent>),
    Progress(UtteranceEvent),
}

impl<V: StatusView> Screen<V> {
    pub fn new(
        controller: PlaybackController,
        orchestrator: InputOrchestrator,
        view: V,
    ) -> (Self, ScreenHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = ScreenHandle {
            tx: events_tx.clone(),
        };
        let screen = Self {
            controller,
            orchestrator,
            view,
            events_tx,
            events_rx,
            progress_rx: None,
            deferred: None,
            init_task: None,
            closing: false,
        };
        (screen, handle)
    }

    /// Runs until closed, then tears everything down and hands the view back.
    pub async fn run(mut self) -> V {
        self.init_task = Some(self.controller.initialize(self.events_tx.clone()));

        loop {
            let step = tokio::select! {
                event = self.events_rx.recv() => Step::Event(event),
                Some(progress) = next_progress(&mut self.progress_rx) => Step::Progress(progress),
            };

            match step {
                Step::Event(Some(event)) => {
                    if !self.handle(event).await {
                        break;
                    }
                }
                // Channel closed
                Step::Event(None) => break,
                Step::Progress(progress) => {
                    self.controller.on_progress(progress, &mut self.view);
                }
            }

            if self.closing && self.is_settled() {
                tracing::debug!("Screen idle, closing");
                break;
            }
        }

        self.teardown();
        self.view
    }

    pub fn status(&self) -> PlaybackStatus {
        self.controller.status()
    }

    fn is_settled(&self) -> bool {
        !self.orchestrator.is_pending() && self.deferred.is_none() && self.controller.is_settled()
    }

    /// Returns false when the loop should stop.
    async fn handle(&mut self, event: ScreenEvent) -> bool {
        match event {
            ScreenEvent::Submit(text) => {
                let request = self.orchestrator.on_submit(text, self.events_tx.clone());
                tracing::debug!("Submitted request {}", request);
            }
            ScreenEvent::EngineReady(result) => {
                self.init_task = None;
                self.progress_rx = self.controller.on_initialized(result, &mut self.view);
                if let Some(utterance) = self.deferred.take() {
                    self.speak(utterance).await;
                }
            }
            ScreenEvent::Detected { request, utterance } => {
                if self.orchestrator.accept(request) {
                    if self.controller.state() == crate::playback::EngineState::Pending {
                        tracing::debug!("Engine still starting, deferring request {}", request);
                        self.deferred = Some(utterance);
                    } else {
                        self.speak(utterance).await;
                    }
                }
            }
            ScreenEvent::CloseWhenIdle => self.closing = true,
            ScreenEvent::Close => return false,
        }
        true
    }

    async fn speak(&mut self, utterance: UtteranceRequest) {
        self.controller
            .speak(&utterance.language_code, &utterance.text, &mut self.view)
            .await;
    }

    fn teardown(&mut self) {
        self.orchestrator.cancel();
        if let Some(task) = self.init_task.take() {
            task.abort();
        }
        self.deferred = None;
        self.progress_rx = None;
        self.controller.shutdown();
    }
}

async fn next_progress(rx: &mut Option<UnboundedReceiver<UtteranceEvent>>) -> Option<UtteranceEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingView {
    pub statuses: Vec<PlaybackStatus>,
    pub notices: Vec<String>,
}

#[cfg(test)]
impl StatusView for RecordingView {
    fn show_status(&mut self, status: PlaybackStatus) {
        self.statuses.push(status);
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(PlaybackStatus::Speaking), "Status: listening...");
        assert_eq!(status_label(PlaybackStatus::Idle), "Status: listening done");
    }

    #[test]
    fn test_recording_view_records() {
        let mut view = RecordingView::default();
        view.show_status(PlaybackStatus::Speaking);
        view.show_notice("hi");
        assert_eq!(view.statuses, vec![PlaybackStatus::Speaking]);
        assert_eq!(view.notices, vec!["hi".to_string()]);
    }
}
