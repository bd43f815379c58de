//! Translator configuration.
//! Defaults mirror the extension's shipped constants; any field can be
//! overridden through `INLINE_TRANSLATOR_*` environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::translate::LanguagePair;

pub const API_ENDPOINT: &str = "https://api.mymemory.translated.net/get";
pub const DEFAULT_SOURCE_LANG: &str = "en";
pub const DEFAULT_TARGET_LANG: &str = "zh";
/// Quiescence window for selection events.
pub const DEBOUNCE_DELAY_MS: u64 = 300;
/// 24 hours.
pub const CACHE_DURATION_MS: u64 = 24 * 60 * 60 * 1000;
/// How long a failure notice stays up before the status resets.
pub const ERROR_DISMISS_MS: u64 = 3000;

const ENV_PREFIX: &str = "INLINE_TRANSLATOR_";

/// Retry behaviour for the remote call. The default never retries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based): base * 2^attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(1 << attempt.min(16)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_endpoint: String,
    pub default_source_lang: String,
    pub default_target_lang: String,
    pub debounce_delay_ms: u64,
    pub cache_duration_ms: u64,
    pub error_dismiss_ms: u64,
    /// Optional per-request timeout. None means wait as long as the host allows.
    pub request_timeout_ms: Option<u64>,
    pub retry: RetryPolicy,
    /// Language code → display name.
    pub supported_languages: BTreeMap<String, String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        let supported_languages = [
            ("en", "English"),
            ("zh", "中文"),
            ("ja", "日本語"),
            ("ko", "한국어"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            api_endpoint: API_ENDPOINT.to_string(),
            default_source_lang: DEFAULT_SOURCE_LANG.to_string(),
            default_target_lang: DEFAULT_TARGET_LANG.to_string(),
            debounce_delay_ms: DEBOUNCE_DELAY_MS,
            cache_duration_ms: CACHE_DURATION_MS,
            error_dismiss_ms: ERROR_DISMISS_MS,
            request_timeout_ms: None,
            retry: RetryPolicy::default(),
            supported_languages,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { key: String, value: String },
    UnsupportedLanguage(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
            ConfigError::UnsupportedLanguage(code) => write!(f, "unsupported language: {code}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TranslatorConfig {
    /// Defaults overlaid with whatever `INLINE_TRANSLATOR_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("API_ENDPOINT") {
            cfg.api_endpoint = v;
        }
        if let Some(v) = var("SOURCE_LANG") {
            cfg.default_source_lang = v;
        }
        if let Some(v) = var("TARGET_LANG") {
            cfg.default_target_lang = v;
        }
        if let Some(v) = var("DEBOUNCE_DELAY") {
            cfg.debounce_delay_ms = parse_num("DEBOUNCE_DELAY", &v)?;
        }
        if let Some(v) = var("CACHE_DURATION") {
            cfg.cache_duration_ms = parse_num("CACHE_DURATION", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT") {
            cfg.request_timeout_ms = Some(parse_num("REQUEST_TIMEOUT", &v)?);
        }
        if let Some(v) = var("MAX_RETRIES") {
            cfg.retry.max_retries = parse_num("MAX_RETRIES", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for code in [&self.default_source_lang, &self.default_target_lang] {
            if !self.is_supported(code) {
                return Err(ConfigError::UnsupportedLanguage(code.clone()));
            }
        }
        Ok(())
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.supported_languages.contains_key(code)
    }

    pub fn default_pair(&self) -> LanguagePair {
        LanguagePair::new(&self.default_source_lang, &self.default_target_lang)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_millis(self.cache_duration_ms)
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
    })
}
