//! Translation orchestration: detect → cache → backend → cache write-back.
//! Any backend failure degrades to the original text; the page never sees an error.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::cache::TranslationCache;
use super::detect::{resolve_pair, CjkHeuristic, LanguageDetector};
use super::{LanguagePair, TranslateError, TranslateResult, Translator};
use crate::config::TranslatorConfig;
use crate::debounce::Debounced;
use crate::inline::{HostMessage, InlineTranslation, Selection};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::status::StatusBoard;

const FAILURE_NOTICE: &str = "Translation failed. Please try again later.";

pub struct TranslationService {
    backend: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
    detector: Arc<dyn LanguageDetector>,
    pair: RwLock<LanguagePair>,
    config: TranslatorConfig,
    status: Arc<StatusBoard>,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationService {
    pub fn new(
        config: TranslatorConfig,
        backend: Arc<dyn Translator>,
        cache: Arc<TranslationCache>,
    ) -> Self {
        Self {
            backend,
            cache,
            detector: Arc::new(CjkHeuristic::new()),
            pair: RwLock::new(config.default_pair()),
            status: Arc::new(StatusBoard::new(config.error_dismiss())),
            metrics: Arc::new(MetricsRegistry::new()),
            config,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// The configured default pair.
    pub fn pair(&self) -> LanguagePair {
        self.pair.read().clone()
    }

    pub fn set_pair(&self, pair: LanguagePair) -> Result<(), TranslateError> {
        for code in [&pair.source, &pair.target] {
            if !self.config.is_supported(code) {
                return Err(TranslateError::UnsupportedLanguage(code.clone()));
            }
        }
        info!(pair = %pair, "language pair updated");
        *self.pair.write() = pair;
        Ok(())
    }

    pub fn handle_message(&self, message: HostMessage) -> Result<(), TranslateError> {
        match message {
            HostMessage::UpdateLanguages {
                source_lang,
                target_lang,
            } => self.set_pair(LanguagePair::new(source_lang, target_lang)),
        }
    }

    /// Direction to use for `text` under the current configuration.
    pub fn pair_for(&self, text: &str) -> LanguagePair {
        let detected = self.detector.detect(text);
        resolve_pair(&detected, &self.pair.read())
    }

    /// Translate without the fallback: errors are returned to the caller.
    pub async fn try_translate(&self, text: &str) -> Result<TranslateResult, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }
        let request_id = uuid::Uuid::new_v4().to_string();
        self.translate_inner(&request_id, text).await
    }

    /// Best-effort translation. On failure the original text comes back with
    /// `fallback` set, and a transient failure status is published.
    pub async fn translate(&self, text: &str) -> TranslateResult {
        let request_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        match self.translate_inner(&request_id, text).await {
            Ok(result) => result,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "translation failed, keeping original text");
                self.metrics.incr(metric_names::BACKEND_FAILURE);
                self.status.fail(&request_id, FAILURE_NOTICE);
                TranslateResult {
                    request_id,
                    source_text: text.to_string(),
                    translated_text: text.to_string(),
                    pair: self.pair_for(text),
                    cached: false,
                    fallback: true,
                    elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                }
            }
        }
    }

    async fn translate_inner(
        &self,
        request_id: &str,
        text: &str,
    ) -> Result<TranslateResult, TranslateError> {
        let start = Instant::now();
        let pair = self.pair_for(text);

        if let Some(hit) = self.cache.get(text, &pair.source, &pair.target) {
            self.metrics.incr(metric_names::CACHE_HIT);
            debug!(request_id, pair = %pair, "cache hit");
            return Ok(TranslateResult {
                request_id: request_id.to_string(),
                source_text: text.to_string(),
                translated_text: hit,
                pair,
                cached: true,
                fallback: false,
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }
        self.metrics.incr(metric_names::CACHE_MISS);

        self.status.start(request_id);
        let span = self.metrics.span(metric_names::TRANSLATE_DONE);
        let translated = self.backend.translate(text, &pair).await?;
        let elapsed_ms = span.finish();

        self.cache.set(text, &translated, &pair.source, &pair.target);
        self.status.finish(request_id);
        info!(
            request_id,
            pair = %pair,
            text_len = text.chars().count(),
            elapsed_ms,
            "translation fetched"
        );

        Ok(TranslateResult {
            request_id: request_id.to_string(),
            source_text: text.to_string(),
            translated_text: translated,
            pair,
            cached: false,
            fallback: false,
            elapsed_ms,
        })
    }

    /// Turn a selection into an inline span. Empty or nested selections yield None.
    pub async fn translate_selection(&self, selection: &Selection) -> Option<InlineTranslation> {
        let text = selection.translatable_text()?;
        let result = self.translate(text).await;
        Some(InlineTranslation::new(text, result.translated_text))
    }

    /// Debounced selection handler. Only the last selection of a burst is
    /// translated; the finished span is handed to `on_span`.
    pub fn debounced_selection_handler<F>(self: &Arc<Self>, on_span: F) -> Debounced<Selection>
    where
        F: Fn(InlineTranslation) + Send + Sync + 'static,
    {
        let service = Arc::clone(self);
        let on_span = Arc::new(on_span);
        Debounced::new(self.config.debounce_delay(), move |selection: Selection| {
            let service = Arc::clone(&service);
            let on_span = Arc::clone(&on_span);
            async move {
                if let Some(span) = service.translate_selection(&selection).await {
                    on_span(span);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::status::TranslationStatus;
    use futures_util::future::BoxFuture;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Backend that replays scripted answers and records what it was asked.
    #[derive(Default)]
    struct ScriptedBackend {
        answers: Mutex<VecDeque<Result<String, TranslateError>>>,
        seen: Mutex<Vec<(String, LanguagePair)>>,
    }

    impl ScriptedBackend {
        fn with(answers: Vec<Result<String, TranslateError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, LanguagePair)> {
            self.seen.lock().clone()
        }
    }

    impl Translator for ScriptedBackend {
        fn translate<'a>(
            &'a self,
            text: &'a str,
            pair: &'a LanguagePair,
        ) -> BoxFuture<'a, Result<String, TranslateError>> {
            self.seen.lock().push((text.to_string(), pair.clone()));
            let answer = self
                .answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TranslateError::Network("no scripted answer".into())));
            Box::pin(async move { answer })
        }
    }

    fn service(backend: Arc<ScriptedBackend>) -> (TranslationService, ManualClock) {
        let clock = ManualClock::new(0);
        let config = TranslatorConfig::default();
        let cache = Arc::new(TranslationCache::with_clock(
            config.cache_duration(),
            Arc::new(clock.clone()),
        ));
        (TranslationService::new(config, backend, cache), clock)
    }

    #[tokio::test]
    async fn miss_fetches_and_fills_cache() {
        let backend = ScriptedBackend::with(vec![Ok("你好".into())]);
        let (svc, _) = service(Arc::clone(&backend));

        let result = svc.translate("Hello").await;
        assert_eq!(result.translated_text, "你好");
        assert!(!result.cached && !result.fallback);
        assert_eq!(result.pair, LanguagePair::new("en", "zh"));
        assert_eq!(svc.cache().get("Hello", "en", "zh").as_deref(), Some("你好"));
        assert!(matches!(svc.status().current(), TranslationStatus::Done { .. }));
    }

    #[tokio::test]
    async fn hit_skips_backend() {
        let backend = ScriptedBackend::with(vec![]);
        let (svc, _) = service(Arc::clone(&backend));
        svc.cache().set("Hello", "你好", "en", "zh");

        let result = svc.translate("Hello").await;
        assert!(result.cached);
        assert_eq!(result.translated_text, "你好");
        assert!(backend.calls().is_empty());
        assert_eq!(svc.metrics().count(metric_names::CACHE_HIT), 1);
    }

    #[tokio::test]
    async fn chinese_text_goes_the_other_way() {
        let backend = ScriptedBackend::with(vec![Ok("Hello".into())]);
        let (svc, _) = service(Arc::clone(&backend));

        let result = svc.translate("你好").await;
        assert_eq!(result.translated_text, "Hello");
        assert_eq!(backend.calls()[0].1, LanguagePair::new("zh", "en"));
        assert_eq!(svc.cache().get("你好", "zh", "en").as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn failure_returns_original_and_is_not_cached() {
        let backend = ScriptedBackend::with(vec![Err(TranslateError::Http { status: 500 })]);
        let (svc, _) = service(Arc::clone(&backend));

        let result = svc.translate("Hello").await;
        assert!(result.fallback);
        assert_eq!(result.translated_text, "Hello");
        assert!(svc.cache().is_empty());
        assert_eq!(svc.metrics().count(metric_names::BACKEND_FAILURE), 1);
        assert!(matches!(svc.status().current(), TranslationStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn malformed_response_falls_back_like_network_failure() {
        let backend = ScriptedBackend::with(vec![Err(TranslateError::MalformedResponse(
            "missing responseData.translatedText".into(),
        ))]);
        let (svc, _) = service(backend);
        let result = svc.translate("Hello").await;
        assert!(result.fallback);
        assert_eq!(result.translated_text, "Hello");
    }

    #[tokio::test]
    async fn try_translate_surfaces_errors() {
        let backend = ScriptedBackend::with(vec![Err(TranslateError::Network("reset".into()))]);
        let (svc, _) = service(backend);
        assert!(matches!(
            svc.try_translate("Hello").await,
            Err(TranslateError::Network(_))
        ));
        assert!(matches!(
            svc.try_translate("   ").await,
            Err(TranslateError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let backend = ScriptedBackend::with(vec![Ok("你好".into()), Ok("您好".into())]);
        let (svc, clock) = service(Arc::clone(&backend));

        svc.translate("Hello").await;
        clock.advance(Duration::from_secs(24 * 60 * 60).as_millis() as u64);
        let result = svc.translate("Hello").await;

        assert!(!result.cached);
        assert_eq!(result.translated_text, "您好");
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(svc.cache().len(), 1);
    }

    #[tokio::test]
    async fn update_languages_changes_pair() {
        let backend = ScriptedBackend::with(vec![Ok("Bonjour".into())]);
        let (mut svc, _) = service(Arc::clone(&backend));
        svc.config.supported_languages.insert("fr".into(), "Français".into());

        svc.handle_message(HostMessage::UpdateLanguages {
            source_lang: "en".into(),
            target_lang: "fr".into(),
        })
        .unwrap();
        assert_eq!(svc.pair(), LanguagePair::new("en", "fr"));

        svc.translate("Hello").await;
        assert_eq!(backend.calls()[0].1, LanguagePair::new("en", "fr"));
    }

    #[tokio::test]
    async fn unsupported_language_is_refused() {
        let (svc, _) = service(ScriptedBackend::with(vec![]));
        let err = svc
            .handle_message(HostMessage::UpdateLanguages {
                source_lang: "en".into(),
                target_lang: "xx".into(),
            })
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedLanguage(code) if code == "xx"));
        assert_eq!(svc.pair(), LanguagePair::new("en", "zh"));
    }

    #[tokio::test]
    async fn selection_becomes_toggleable_span() {
        let backend = ScriptedBackend::with(vec![Ok("你好".into())]);
        let (svc, _) = service(backend);

        let mut span = svc
            .translate_selection(&Selection::new("  Hello "))
            .await
            .unwrap();
        assert_eq!(span.displayed(), "你好");
        assert_eq!(span.toggle(), "Hello");

        assert!(svc.translate_selection(&Selection::new("  ")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_handler_translates_last_selection_only() {
        let backend = ScriptedBackend::with(vec![Ok("世界".into())]);
        let (svc, _) = service(Arc::clone(&backend));
        let svc = Arc::new(svc);

        let spans = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&spans);
        let handler = svc.debounced_selection_handler(move |span| sink.lock().push(span));

        handler.call(Selection::new("Hel"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.call(Selection::new("Hello"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.call(Selection::new("World"));
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].0, "World");
        let spans = spans.lock();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].displayed(), "世界");
    }
}
