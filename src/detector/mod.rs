pub mod service;
pub mod whatlang;

use crate::config_loader::Settings;
use crate::error::Result;
use crate::language::Detection;
use std::sync::Arc;

pub use self::service::ServiceDetector;
pub use self::whatlang::WhatlangDetector;

/// Anything that can guess which language a piece of text is written in.
/// Implementations must not block the caller: heavy work belongs on the
/// blocking pool or behind an await point.
#[async_trait::async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Returns the unique ID of the detector (e.g., "whatlang")
    fn id(&self) -> &'static str;

    /// Best guess for `text`, or [`Detection::Undetermined`]. An error means
    /// the classifier itself failed.
    async fn identify(&self, text: &str) -> Result<Detection>;
}

/// Builds the detector named by `settings.detector`.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn LanguageDetector>> {
    match settings.detector.as_str() {
        "service" => Ok(Arc::new(ServiceDetector::new(
            &settings.detector_url,
            settings.detector_timeout_secs,
            settings.min_confidence,
        )?)),
        _ => Ok(Arc::new(WhatlangDetector::new(settings.min_confidence))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_picks_detector() {
        let mut settings = Settings::default();
        assert_eq!(from_settings(&settings).unwrap().id(), "whatlang");

        settings.detector = "service".to_string();
        assert_eq!(from_settings(&settings).unwrap().id(), "service");
    }
}
