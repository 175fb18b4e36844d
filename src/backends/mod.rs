pub mod espeak;

/// Represents a text-to-speech voice
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    /// Other language tags the voice also speaks (`zh` for `cmn`)
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Trait that all speech synthesis backends must implement.
/// A backend only turns text into audio bytes; playback, queueing and
/// progress reporting live in [`crate::engine::AudioEngine`].
pub trait SpeechBackend: Send + Sync {
    /// Returns the unique ID of the backend (e.g., "espeak-ng")
    fn id(&self) -> &'static str;

    /// Verifies the backend can run at all (binary present, data installed)
    fn probe(&self) -> std::io::Result<()>;

    /// Returns WAV data for `text` or an error.
    /// 'voice' is an optional specific voice ID to use
    fn synthesize(&self, text: &str, voice: Option<&str>) -> std::io::Result<Vec<u8>>;

    /// Returns a list of installed voices
    fn list_voices(&self) -> std::io::Result<Vec<Voice>>;
}
