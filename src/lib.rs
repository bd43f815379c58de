//! Inline translator: select text, see it translated in place, toggle back.
//! Library core: TTL translation cache, debounced request coordinator, and the
//! orchestration that ties them to a remote translation backend.

pub mod clock;
pub mod config;
pub mod debounce;
pub mod inline;
pub mod metrics;
pub mod status;
pub mod translate;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use config::TranslatorConfig;
use inline::{HostMessage, InlineTranslation, Selection};
use translate::mymemory::MyMemoryClient;
use translate::{TranslationCache, TranslationService};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inline_translator=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build the service from config with the MyMemory backend and a fresh cache.
pub fn build_service(config: TranslatorConfig) -> Result<Arc<TranslationService>, BoxError> {
    let client = MyMemoryClient::new(&config)?;
    info!(endpoint = client.endpoint(), "translation backend ready");
    let cache = Arc::new(TranslationCache::new(config.cache_duration()));
    Ok(Arc::new(TranslationService::new(
        config,
        Arc::new(client),
        cache,
    )))
}

/// Line-oriented driver: each stdin line is a selection. `{...}` lines are host
/// messages, `:toggle` flips the last span, `:metrics` dumps counters.
pub async fn run() -> Result<(), BoxError> {
    init_tracing();
    info!("inline-translator starting");

    let config = TranslatorConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "config invalid, using defaults");
        TranslatorConfig::default()
    });
    let service = build_service(config)?;

    let last_span: Arc<Mutex<Option<InlineTranslation>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last_span);
    let handler = service.debounced_selection_handler(move |span| {
        println!("{}", span.displayed());
        *sink.lock() = Some(span);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            ":toggle" => {
                if let Some(span) = last_span.lock().as_mut() {
                    println!("{}", span.toggle());
                }
            }
            ":metrics" => {
                println!("{}", serde_json::to_string(&service.metrics().summary())?);
            }
            l if l.starts_with('{') => match serde_json::from_str::<HostMessage>(l) {
                Ok(msg) => {
                    if let Err(e) = service.handle_message(msg) {
                        warn!(error = %e, "host message rejected");
                    }
                }
                Err(e) => warn!(error = %e, "unparseable host message"),
            },
            _ => handler.call(Selection::new(line)),
        }
    }

    handler.drain().await;
    info!("inline-translator exiting");
    Ok(())
}
