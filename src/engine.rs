use crate::backends::{SpeechBackend, Voice};
use crate::error::{Result, SpeakError};
use crate::language::Locale;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How a new utterance treats whatever is already playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Drop everything playing or queued, play this now
    Flush,
    /// Play after everything already queued
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageAvailability {
    Available,
    MissingData,
    NotSupported,
}

/// Progress notifications, tagged with the utterance id given to `speak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Start(String),
    Done(String),
    Error(String),
}

impl UtteranceEvent {
    pub fn utterance_id(&self) -> &str {
        match self {
            UtteranceEvent::Start(id) | UtteranceEvent::Done(id) | UtteranceEvent::Error(id) => id,
        }
    }
}

pub type ProgressListener = mpsc::UnboundedSender<UtteranceEvent>;

/// The voice engine contract the playback controller drives.
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Brings the engine up. Nothing else may be called before this succeeds.
    async fn initialize(&self) -> Result<()>;

    /// Selects the voice for subsequent `speak` calls.
    async fn set_language(&self, locale: &Locale) -> LanguageAvailability;

    /// Queues `text`; progress arrives on the registered listener.
    fn speak(&self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()>;

    /// Registers where progress notifications go. Replaces any previous one.
    fn set_progress_listener(&self, listener: ProgressListener);

    async fn list_voices(&self) -> Result<Vec<Voice>>;

    /// Stops playback and releases the output device.
    fn shutdown(&self);
}

enum AudioCommand {
    Speak {
        text: String,
        voice: Option<String>,
        mode: QueueMode,
        utterance_id: String,
    },
}

struct Queued<T> {
    utterance_id: String,
    track: T,
    started: bool,
}

type SharedListener = Arc<Mutex<Option<ProgressListener>>>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`SpeechEngine`] backed by a [`SpeechBackend`] and a rodio output stream.
/// The stream is not `Send`, so it lives on a dedicated audio thread that
/// receives commands over a channel.
pub struct AudioEngine {
    backend: Arc<dyn SpeechBackend>,
    volume: f32,
    tx: Mutex<Option<Sender<AudioCommand>>>,
    voices: Mutex<Vec<Voice>>,
    voice: Mutex<Option<String>>,
    listener: SharedListener,
}

impl AudioEngine {
    pub fn new(backend: Arc<dyn SpeechBackend>, volume: f32) -> Self {
        Self {
            backend,
            volume,
            tx: Mutex::new(None),
            voices: Mutex::new(Vec::new()),
            voice: Mutex::new(None),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    fn is_running(&self) -> bool {
        self.tx.lock().map(|tx| tx.is_some()).unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl SpeechEngine for AudioEngine {
    async fn initialize(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.probe())
            .await
            .map_err(|e| SpeakError::EngineUnavailable(e.to_string()))?
            .map_err(|e| SpeakError::EngineUnavailable(format!("{}: {}", self.backend.id(), e)))?;

        // An empty list is not fatal here; set_language reports it as missing data
        let voices = match self.list_voices().await {
            Ok(voices) => voices,
            Err(e) => {
                tracing::warn!("Could not list {} voices: {}", self.backend.id(), e);
                Vec::new()
            }
        };
        if let Ok(mut cached) = self.voices.lock() {
            *cached = voices;
        }

        let (tx, rx) = channel::<AudioCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let backend = self.backend.clone();
        let listener = self.listener.clone();
        let volume = self.volume;

        thread::Builder::new()
            .name("langspeak-audio".to_string())
            .spawn(move || {
                // Audio stream must live on this thread
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(SpeakError::Audio(format!(
                            "No audio output device found: {}",
                            e
                        ))));
                        return;
                    }
                };
                audio_loop(rx, &listener, |text, voice| {
                    prepare_sink(backend.as_ref(), &handle, text, voice, volume)
                });
            })?;

        ready_rx
            .await
            .map_err(|_| SpeakError::Audio("audio thread exited during startup".to_string()))??;

        if let Ok(mut slot) = self.tx.lock() {
            *slot = Some(tx);
        }
        tracing::info!("Audio engine ready ({})", self.backend.id());
        Ok(())
    }

    async fn set_language(&self, locale: &Locale) -> LanguageAvailability {
        let Ok(voices) = self.voices.lock() else {
            return LanguageAvailability::MissingData;
        };
        let (availability, voice) = match_voice(&voices, locale);
        drop(voices);

        if let Some(voice) = voice {
            if let Ok(mut current) = self.voice.lock() {
                *current = Some(voice);
            }
        }
        availability
    }

    fn speak(&self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()> {
        let voice = self.voice.lock().ok().and_then(|v| v.clone());
        let tx = self
            .tx
            .lock()
            .map_err(|_| SpeakError::EngineUnavailable("engine state poisoned".to_string()))?;
        let tx = tx
            .as_ref()
            .ok_or_else(|| SpeakError::EngineUnavailable("engine not initialized".to_string()))?;

        tx.send(AudioCommand::Speak {
            text: text.to_string(),
            voice,
            mode,
            utterance_id: utterance_id.to_string(),
        })
        .map_err(|_| SpeakError::EngineUnavailable("audio thread has stopped".to_string()))
    }

    fn set_progress_listener(&self, listener: ProgressListener) {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(listener);
        }
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        let backend = self.backend.clone();
        let voices = tokio::task::spawn_blocking(move || backend.list_voices())
            .await
            .map_err(|e| SpeakError::EngineUnavailable(e.to_string()))??;
        Ok(voices)
    }

    fn shutdown(&self) {
        // Dropping the sender ends the audio loop, which stops every sink
        if let Ok(mut slot) = self.tx.lock() {
            slot.take();
        }
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }
    }
}

/// Exact tag first (`fr-fr`), then primary language (`fr`), then the
/// other languages a voice declares (`cmn` also speaks `zh`).
fn match_voice(voices: &[Voice], locale: &Locale) -> (LanguageAvailability, Option<String>) {
    if voices.is_empty() {
        return (LanguageAvailability::MissingData, None);
    }

    let tag = locale.voice_tag();
    let primary = locale.language();
    let exact = voices.iter().find(|v| v.language == tag);
    let loose = || {
        voices.iter().find(|v| {
            v.language == primary || v.language.split('-').next() == Some(primary)
        })
    };
    let alias = || {
        voices
            .iter()
            .find(|v| v.aliases.iter().any(|a| *a == tag))
            .or_else(|| voices.iter().find(|v| v.aliases.iter().any(|a| a == primary)))
    };

    match exact.or_else(loose).or_else(alias) {
        Some(voice) => (LanguageAvailability::Available, Some(voice.id.clone())),
        None => (LanguageAvailability::NotSupported, None),
    }
}

fn emit(listener: &SharedListener, event: UtteranceEvent) {
    if let Ok(slot) = listener.lock() {
        if let Some(tx) = slot.as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// One utterance's audio as the queue sees it. Tracks are created paused
/// and only start once they reach the front of the queue.
trait Track {
    fn play(&self);
    fn stop(&self);
    fn is_finished(&self) -> bool;
}

impl Track for Sink {
    fn play(&self) {
        Sink::play(self);
    }

    fn stop(&self) {
        Sink::stop(self);
    }

    fn is_finished(&self) -> bool {
        self.empty()
    }
}

/// Runs until the command sender is dropped. `prepare` turns text and voice
/// into a paused track.
fn audio_loop<T, F>(rx: Receiver<AudioCommand>, listener: &SharedListener, mut prepare: F)
where
    T: Track,
    F: FnMut(&str, Option<&str>) -> Result<T>,
{
    let mut queue: VecDeque<Queued<T>> = VecDeque::new();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(command) => {
                enqueue(&mut queue, command, listener, &mut prepare);
                // Take the whole backlog before anything starts playing
                while let Ok(command) = rx.try_recv() {
                    enqueue(&mut queue, command, listener, &mut prepare);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        advance(&mut queue, listener);
    }

    for queued in queue.drain(..) {
        queued.track.stop();
    }
}

fn enqueue<T, F>(
    queue: &mut VecDeque<Queued<T>>,
    command: AudioCommand,
    listener: &SharedListener,
    prepare: &mut F,
) where
    T: Track,
    F: FnMut(&str, Option<&str>) -> Result<T>,
{
    let AudioCommand::Speak {
        text,
        voice,
        mode,
        utterance_id,
    } = command;

    if mode == QueueMode::Flush {
        for queued in queue.drain(..) {
            tracing::debug!("Flushing utterance {}", queued.utterance_id);
            queued.track.stop();
        }
    }

    match prepare(&text, voice.as_deref()) {
        Ok(track) => queue.push_back(Queued {
            utterance_id,
            track,
            started: false,
        }),
        Err(e) => {
            tracing::error!("Synthesis failed for {}: {}", utterance_id, e);
            emit(listener, UtteranceEvent::Error(utterance_id));
        }
    }
}

/// Starts the front track if needed and retires finished ones.
fn advance<T: Track>(queue: &mut VecDeque<Queued<T>>, listener: &SharedListener) {
    while let Some(front) = queue.front_mut() {
        if !front.started {
            front.track.play();
            front.started = true;
            emit(listener, UtteranceEvent::Start(front.utterance_id.clone()));
        }
        if !front.track.is_finished() {
            break;
        }
        if let Some(done) = queue.pop_front() {
            emit(listener, UtteranceEvent::Done(done.utterance_id));
        }
    }
}

/// Synthesizes `text` into a fresh, paused sink. Empty text gets an empty
/// sink, which finishes as soon as it starts.
fn prepare_sink(
    backend: &dyn SpeechBackend,
    handle: &OutputStreamHandle,
    text: &str,
    voice: Option<&str>,
    volume: f32,
) -> Result<Sink> {
    let sink = Sink::try_new(handle).map_err(|e| SpeakError::Audio(e.to_string()))?;
    sink.set_volume(volume);
    sink.pause();

    if text.trim().is_empty() {
        return Ok(sink);
    }

    let wav = backend
        .synthesize(text, voice)
        .map_err(|e| SpeakError::Synthesis(e.to_string()))?;
    let source = Decoder::new(Cursor::new(wav))
        .map_err(|e| SpeakError::Synthesis(format!("Failed to decode: {}", e)))?;
    sink.append(source.convert_samples::<f32>());
    Ok(sink)
}
