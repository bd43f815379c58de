//! Source language detection.
//! Default is a single regex check: any CJK ideograph means Chinese, else English.
//! A whatlang-backed detector is available for wider coverage.

use regex::Regex;

use super::LanguagePair;

pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code of the dominant language in `text`.
    fn detect(&self, text: &str) -> String;
}

/// Reference heuristic: U+4E00..U+9FA5 anywhere in the text → "zh", otherwise "en".
pub struct CjkHeuristic {
    han: Regex,
}

impl CjkHeuristic {
    pub fn new() -> Self {
        Self {
            han: Regex::new(r"[\x{4e00}-\x{9fa5}]").expect("static CJK pattern"),
        }
    }

    pub fn contains_chinese(&self, text: &str) -> bool {
        self.han.is_match(text)
    }
}

impl Default for CjkHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for CjkHeuristic {
    fn detect(&self, text: &str) -> String {
        let code = if self.contains_chinese(text) { "zh" } else { "en" };
        code.to_string()
    }
}

/// Statistical detection via whatlang. Unreliable guesses fall back to `fallback`.
pub struct WhatlangDetector {
    fallback: String,
}

impl WhatlangDetector {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> String {
        match whatlang::detect(text) {
            Some(info) if info.is_reliable() => lang_to_code(info.lang())
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback.clone()),
            _ => self.fallback.clone(),
        }
    }
}

fn lang_to_code(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang::*;
    let code = match lang {
        Eng => "en",
        Cmn => "zh",
        Jpn => "ja",
        Kor => "ko",
        Fra => "fr",
        Deu => "de",
        Spa => "es",
        Rus => "ru",
        Por => "pt",
        Ita => "it",
        _ => return None,
    };
    Some(code)
}

/// Pick the direction for `detected` text given the configured pair.
/// Text already in the target language is translated back the other way.
pub fn resolve_pair(detected: &str, configured: &LanguagePair) -> LanguagePair {
    if detected == configured.target && detected != configured.source {
        configured.reversed()
    } else {
        configured.clone()
    }
}
