//! MyMemory translation client.
//! GET {endpoint}?q=<text>&langpair=<src>|<tgt>, answer in responseData.translatedText.
//! Pooled reqwest client; retries only when the policy asks for it.

use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{LanguagePair, TranslateError, Translator};
use crate::config::{RetryPolicy, TranslatorConfig};

pub struct MyMemoryClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl MyMemoryClient {
    pub fn new(config: &TranslatorConfig) -> Result<Self, TranslateError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TranslateError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.api_endpoint.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One translation, retried per policy on transient failures.
    pub async fn fetch(&self, text: &str, pair: &LanguagePair) -> Result<String, TranslateError> {
        let mut attempt: u32 = 0;
        loop {
            let start = Instant::now();
            match self.fetch_once(text, pair).await {
                Ok(translated) => {
                    debug!(
                        pair = %pair,
                        attempt,
                        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "mymemory translation ok"
                    );
                    return Ok(translated);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "translation request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, text: &str, pair: &LanguagePair) -> Result<String, TranslateError> {
        let langpair = pair.langpair();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await
            .map_err(|e| TranslateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranslateError::Network(e.to_string()))?;
        parse_response(&body)
    }
}

impl Translator for MyMemoryClient {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        pair: &'a LanguagePair,
    ) -> BoxFuture<'a, Result<String, TranslateError>> {
        Box::pin(self.fetch(text, pair))
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(rename = "responseData")]
    response_data: Option<ResponseData>,
}

#[derive(Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

fn parse_response(body: &str) -> Result<String, TranslateError> {
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|e| TranslateError::MalformedResponse(format!("JSON parse error: {e}")))?;
    parsed
        .response_data
        .and_then(|d| d.translated_text)
        .ok_or_else(|| {
            TranslateError::MalformedResponse("missing responseData.translatedText".into())
        })
}
