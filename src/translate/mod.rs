//! Translation module: cache, language detection, remote backend, orchestration.

pub mod cache;
pub mod detect;
pub mod mymemory;
pub mod service;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use cache::TranslationCache;
pub use service::TranslationService;

/// A directed language pair, e.g. en → zh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// The same pair in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }

    /// MyMemory-style `src|tgt`.
    pub fn langpair(&self) -> String {
        format!("{}|{}", self.source, self.target)
    }
}

impl std::fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Translation result as seen by callers of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResult {
    pub request_id: String,
    pub source_text: String,
    pub translated_text: String,
    pub pair: LanguagePair,
    pub cached: bool,
    /// True when the backend failed and `translated_text` is the original input.
    pub fallback: bool,
    pub elapsed_ms: f64,
}

/// Remote translation backend (adapter for different APIs).
pub trait Translator: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        pair: &'a LanguagePair,
    ) -> BoxFuture<'a, Result<String, TranslateError>>;
}

#[derive(Debug)]
pub enum TranslateError {
    /// Transport-level failure: DNS, connect, reset, timeout.
    Network(String),
    /// Non-2xx response.
    Http { status: u16 },
    /// Body did not carry `responseData.translatedText`.
    MalformedResponse(String),
    UnsupportedLanguage(String),
    EmptyText,
}

impl TranslateError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslateError::Network(_) => true,
            TranslateError::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Network(msg) => write!(f, "network error: {msg}"),
            TranslateError::Http { status } => write!(f, "HTTP error! status: {status}"),
            TranslateError::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            TranslateError::UnsupportedLanguage(code) => {
                write!(f, "unsupported language: {code}")
            }
            TranslateError::EmptyText => write!(f, "nothing to translate"),
        }
    }
}

impl std::error::Error for TranslateError {}
