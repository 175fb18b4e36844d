pub mod backends;
pub mod config_loader;
pub mod detector;
pub mod engine;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod playback;
pub mod screen;

use backends::espeak::EspeakBackend;
use config_loader::Settings;
use engine::AudioEngine;
use std::sync::Arc;

/// Builds the espeak-backed engine described by `settings`.
pub fn engine_from_settings(settings: &Settings) -> Arc<AudioEngine> {
    let backend = Arc::new(EspeakBackend::new(
        &settings.espeak_binary,
        settings.speech_rate,
        settings.synthesis_timeout_secs,
    ));
    Arc::new(AudioEngine::new(backend, settings.playback_volume))
}
