use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DETECTORS: &[&str] = &["whatlang", "service"];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Detection
    pub fallback_language: String,
    pub detector: String, // "whatlang" or "service"
    pub detector_url: String,
    pub detector_timeout_secs: u64,
    pub min_confidence: f64,
    // Synthesis
    pub espeak_binary: String,
    pub speech_rate: u32,           // words per minute
    pub synthesis_timeout_secs: u64,
    pub playback_volume: f32,       // 0.0 - 1.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fallback_language: "en".to_string(),
            detector: "whatlang".to_string(),
            detector_url: "http://127.0.0.1:5000/detect".to_string(),
            detector_timeout_secs: 10,
            min_confidence: 0.5,
            espeak_binary: "espeak-ng".to_string(),
            speech_rate: 175,
            synthesis_timeout_secs: 30,
            playback_volume: 1.0,
        }
    }
}

impl Settings {
    /// Loads defaults, then `Langspeak.*` in the working directory, then the
    /// user config dir, then `explicit` (if any), then `LANGSPEAK_*` env vars.
    pub fn new(explicit: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("fallback_language", defaults.fallback_language)?
            .set_default("detector", defaults.detector)?
            .set_default("detector_url", defaults.detector_url)?
            .set_default("detector_timeout_secs", defaults.detector_timeout_secs as i64)?
            .set_default("min_confidence", defaults.min_confidence)?
            .set_default("espeak_binary", defaults.espeak_binary)?
            .set_default("speech_rate", defaults.speech_rate as i64)?
            .set_default("synthesis_timeout_secs", defaults.synthesis_timeout_secs as i64)?
            .set_default("playback_volume", defaults.playback_volume as f64)?
            .add_source(File::with_name("Langspeak").required(false));

        if let Some(user_file) = user_config_file() {
            builder = builder.add_source(File::with_name(&user_file.to_string_lossy()).required(false));
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // e.g. LANGSPEAK_FALLBACK_LANGUAGE=de
        let settings: Settings = builder
            .add_source(Environment::with_prefix("LANGSPEAK").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.playback_volume < 0.0 || self.playback_volume > 1.0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid playback_volume: {}. Must be between 0.0 and 1.0",
                self.playback_volume
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(config::ConfigError::Message(format!(
                "Invalid min_confidence: {}. Must be between 0.0 and 1.0",
                self.min_confidence
            )));
        }
        if self.fallback_language.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "fallback_language must not be empty".to_string(),
            ));
        }
        if !DETECTORS.contains(&self.detector.as_str()) {
            return Err(config::ConfigError::Message(format!(
                "Unknown detector '{}'. Expected one of: {}",
                self.detector,
                DETECTORS.join(", ")
            )));
        }
        if self.detector_timeout_secs == 0 || self.synthesis_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.speech_rate == 0 {
            return Err(config::ConfigError::Message(
                "speech_rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("langspeak").join("Langspeak"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_config_load_defaults() {
        let settings = Settings::new(None).expect("Failed to load settings");
        assert!(!settings.fallback_language.is_empty());
        assert!(DETECTORS.contains(&settings.detector.as_str()));
    }

    #[test]
    #[serial]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "fallback_language = \"de\"").unwrap();
        writeln!(file, "speech_rate = 140").unwrap();

        let settings = Settings::new(Some(&path)).unwrap();
        assert_eq!(settings.fallback_language, "de");
        assert_eq!(settings.speech_rate, 140);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "fallback_language = \"de\"\n").unwrap();

        std::env::set_var("LANGSPEAK_FALLBACK_LANGUAGE", "it");
        let result = Settings::new(Some(&path));
        std::env::remove_var("LANGSPEAK_FALLBACK_LANGUAGE");

        assert_eq!(result.unwrap().fallback_language, "it");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(Settings::new(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut s = Settings::default();
        s.playback_volume = 1.5;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.detector = "magic".to_string();
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.fallback_language = "  ".to_string();
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.min_confidence = -0.1;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.synthesis_timeout_secs = 0;
        assert!(s.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }
}
