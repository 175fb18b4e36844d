//! Language codes, locales and the detection fallback rule.

use crate::error::SpeakError;
use std::fmt;

/// Wire sentinel classifiers use for "no idea".
pub const UNDETERMINED: &str = "und";

/// Used when nothing else is configured.
pub const DEFAULT_FALLBACK: &str = "en";

/// Result of asking a classifier what language a text is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Language(String),
    Undetermined,
}

impl Detection {
    /// Interprets a raw classifier code, mapping the `und` sentinel and
    /// blanks to [`Detection::Undetermined`].
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() || code.eq_ignore_ascii_case(UNDETERMINED) {
            Detection::Undetermined
        } else {
            Detection::Language(code.to_string())
        }
    }
}

/// One unit of work for the playback controller. Built per submit, never kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceRequest {
    pub text: String,
    pub language_code: String,
}

/// Applies the fallback rule: a detected language passes through, anything
/// inconclusive or failed becomes `fallback`.
pub fn resolve_language(
    outcome: Result<Detection, SpeakError>,
    fallback: &str,
) -> String {
    match outcome {
        Ok(Detection::Language(code))
            if !code.trim().is_empty() && !code.eq_ignore_ascii_case(UNDETERMINED) =>
        {
            code
        }
        Ok(_) => {
            tracing::debug!("Language undetermined, falling back to '{}'", fallback);
            fallback.to_string()
        }
        Err(e) => {
            tracing::warn!("Detection failed ({}), falling back to '{}'", e, fallback);
            fallback.to_string()
        }
    }
}

/// A parsed BCP-47-ish tag: `fr`, `fr-FR`, `zh-Latn`, `pt_BR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    language: String,
    script: Option<String>,
    region: Option<String>,
}

impl Locale {
    pub fn for_language_tag(tag: &str) -> Self {
        let mut parts = tag.trim().split(['-', '_']).filter(|p| !p.is_empty());
        let language = parts.next().unwrap_or_default().to_ascii_lowercase();
        let mut script = None;
        let mut region = None;

        for part in parts {
            if part.len() == 4 && part.chars().all(|c| c.is_ascii_alphabetic()) && script.is_none() {
                let mut chars = part.chars();
                let first = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
                script = Some(format!("{}{}", first, chars.as_str().to_ascii_lowercase()));
            } else if (part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
                || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit()))
            {
                if region.is_none() {
                    region = Some(part.to_ascii_uppercase());
                }
            }
        }

        Self {
            language,
            script,
            region,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Lowercased `language[-region]`, the form espeak-ng names its voices by.
    pub fn voice_tag(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{}", self.language, region.to_ascii_lowercase()),
            None => self.language.clone(),
        }
    }

    /// English name of the language, or the raw code when unknown.
    pub fn display_language(&self) -> String {
        display_name(&self.language)
            .map(str::to_string)
            .unwrap_or_else(|| self.language.clone())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(script) = &self.script {
            write!(f, "-{}", script)?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{}", region)?;
        }
        Ok(())
    }
}

/// (ISO 639-3, ISO 639-1, English name)
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("afr", "af", "Afrikaans"),
    ("aka", "ak", "Akan"),
    ("amh", "am", "Amharic"),
    ("ara", "ar", "Arabic"),
    ("aze", "az", "Azerbaijani"),
    ("bel", "be", "Belarusian"),
    ("ben", "bn", "Bangla"),
    ("bul", "bg", "Bulgarian"),
    ("cat", "ca", "Catalan"),
    ("ces", "cs", "Czech"),
    ("cmn", "zh", "Chinese"),
    ("dan", "da", "Danish"),
    ("deu", "de", "German"),
    ("ell", "el", "Greek"),
    ("eng", "en", "English"),
    ("epo", "eo", "Esperanto"),
    ("est", "et", "Estonian"),
    ("fin", "fi", "Finnish"),
    ("fra", "fr", "French"),
    ("guj", "gu", "Gujarati"),
    ("heb", "he", "Hebrew"),
    ("hin", "hi", "Hindi"),
    ("hrv", "hr", "Croatian"),
    ("hun", "hu", "Hungarian"),
    ("hye", "hy", "Armenian"),
    ("ind", "id", "Indonesian"),
    ("ita", "it", "Italian"),
    ("jav", "jv", "Javanese"),
    ("jpn", "ja", "Japanese"),
    ("kan", "kn", "Kannada"),
    ("kat", "ka", "Georgian"),
    ("khm", "km", "Khmer"),
    ("kor", "ko", "Korean"),
    ("lat", "la", "Latin"),
    ("lav", "lv", "Latvian"),
    ("lit", "lt", "Lithuanian"),
    ("mal", "ml", "Malayalam"),
    ("mar", "mr", "Marathi"),
    ("mkd", "mk", "Macedonian"),
    ("mya", "my", "Burmese"),
    ("nep", "ne", "Nepali"),
    ("nld", "nl", "Dutch"),
    ("nob", "nb", "Norwegian Bokmål"),
    ("ori", "or", "Odia"),
    ("pan", "pa", "Punjabi"),
    ("pes", "fa", "Persian"),
    ("pol", "pl", "Polish"),
    ("por", "pt", "Portuguese"),
    ("ron", "ro", "Romanian"),
    ("rus", "ru", "Russian"),
    ("sin", "si", "Sinhala"),
    ("slk", "sk", "Slovak"),
    ("slv", "sl", "Slovenian"),
    ("sna", "sn", "Shona"),
    ("spa", "es", "Spanish"),
    ("srp", "sr", "Serbian"),
    ("swe", "sv", "Swedish"),
    ("tam", "ta", "Tamil"),
    ("tel", "te", "Telugu"),
    ("tgl", "tl", "Tagalog"),
    ("tha", "th", "Thai"),
    ("tuk", "tk", "Turkmen"),
    ("tur", "tr", "Turkish"),
    ("ukr", "uk", "Ukrainian"),
    ("urd", "ur", "Urdu"),
    ("uzb", "uz", "Uzbek"),
    ("vie", "vi", "Vietnamese"),
    ("yid", "yi", "Yiddish"),
    ("zul", "zu", "Zulu"),
];

/// Maps a three-letter code to its two-letter BCP-47 form.
pub fn iso639_3_to_bcp47(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(three, _, _)| three.eq_ignore_ascii_case(code))
        .map(|(_, two, _)| *two)
}

fn display_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(three, two, _)| two.eq_ignore_ascii_case(code) || three.eq_ignore_ascii_case(code))
        .map(|(_, _, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_detection_passes_through() {
        let lang = resolve_language(Ok(Detection::Language("fr".into())), "en");
        assert_eq!(lang, "fr");
    }

    #[test]
    fn test_undetermined_uses_fallback() {
        assert_eq!(resolve_language(Ok(Detection::Undetermined), "en"), "en");
        // A detector that leaks the raw sentinel still never reaches playback
        assert_eq!(
            resolve_language(Ok(Detection::Language("und".into())), "en"),
            "en"
        );
    }

    #[test]
    fn test_failure_uses_fallback() {
        let err = SpeakError::Detection("classifier offline".into());
        assert_eq!(resolve_language(Err(err), "de"), "de");
    }

    #[test]
    fn test_detection_from_code() {
        assert_eq!(Detection::from_code("und"), Detection::Undetermined);
        assert_eq!(Detection::from_code(" "), Detection::Undetermined);
        assert_eq!(
            Detection::from_code("pt-BR"),
            Detection::Language("pt-BR".into())
        );
    }

    #[test]
    fn test_locale_parsing() {
        let fr = Locale::for_language_tag("fr");
        assert_eq!(fr.language(), "fr");
        assert_eq!(fr.region(), None);
        assert_eq!(fr.voice_tag(), "fr");

        let pt = Locale::for_language_tag("pt_br");
        assert_eq!(pt.region(), Some("BR"));
        assert_eq!(pt.voice_tag(), "pt-br");
        assert_eq!(pt.to_string(), "pt-BR");

        let zh = Locale::for_language_tag("zh-latn");
        assert_eq!(zh.to_string(), "zh-Latn");
        assert_eq!(zh.voice_tag(), "zh");

        let es = Locale::for_language_tag("es-419");
        assert_eq!(es.region(), Some("419"));
    }

    #[test]
    fn test_display_language() {
        assert_eq!(Locale::for_language_tag("fr-FR").display_language(), "French");
        assert_eq!(Locale::for_language_tag("ja").display_language(), "Japanese");
        // Unknown codes display as themselves
        assert_eq!(Locale::for_language_tag("xx").display_language(), "xx");
    }

    #[test]
    fn test_iso639_3_mapping() {
        assert_eq!(iso639_3_to_bcp47("fra"), Some("fr"));
        assert_eq!(iso639_3_to_bcp47("cmn"), Some("zh"));
        assert_eq!(iso639_3_to_bcp47("zzz"), None);
    }

    proptest! {
        #[test]
        fn prop_resolved_language_is_never_undetermined(code in "[a-zA-Z]{0,8}", failed in any::<bool>()) {
            let outcome = if failed {
                Err(SpeakError::Detection("boom".into()))
            } else {
                Ok(Detection::from_code(&code))
            };
            let lang = resolve_language(outcome, DEFAULT_FALLBACK);
            prop_assert!(!lang.is_empty());
            prop_assert!(!lang.eq_ignore_ascii_case(UNDETERMINED));
        }
    }
}
