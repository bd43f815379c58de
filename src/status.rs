//! Translation status broadcast: Idle → Translating → Done | Failed → Idle.
//! The UI subscribes to drive its loading indicator and error notice.
//! Every failure is published, even one from a request a newer one replaced.
//! Failed resets itself to Idle after the dismiss delay.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TranslationStatus {
    Idle,
    Translating { request_id: String },
    Done { request_id: String },
    Failed { request_id: String, message: String },
}

impl TranslationStatus {
    fn name(&self) -> &'static str {
        match self {
            TranslationStatus::Idle => "Idle",
            TranslationStatus::Translating { .. } => "Translating",
            TranslationStatus::Done { .. } => "Done",
            TranslationStatus::Failed { .. } => "Failed",
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: &TranslationStatus) -> bool {
        use TranslationStatus::*;
        matches!(
            (self, next),
            (_, Idle)
                // Overlapping selections may start while another is in flight.
                | (_, Translating { .. })
                | (_, Failed { .. })
                | (Translating { .. }, Done { .. })
        )
    }
}

impl std::fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct StatusBoard {
    tx: watch::Sender<TranslationStatus>,
    dismiss_after: Duration,
}

impl StatusBoard {
    pub fn new(dismiss_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(TranslationStatus::Idle);
        Self { tx, dismiss_after }
    }

    pub fn current(&self) -> TranslationStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranslationStatus> {
        self.tx.subscribe()
    }

    /// Attempt a transition. Returns Err with the reason if it is not allowed.
    pub fn transition(&self, next: TranslationStatus) -> Result<(), String> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| {
            if !current.can_transition_to(&next) {
                let msg = format!("invalid status transition: {} -> {}", current, next);
                warn!("{}", msg);
                result = Err(msg);
                return false;
            }
            info!(from = %current, to = %next, "status_transition");
            *current = next.clone();
            true
        });
        result
    }

    pub fn start(&self, request_id: &str) {
        let _ = self.transition(TranslationStatus::Translating {
            request_id: request_id.to_string(),
        });
    }

    /// Done is only recorded if this request is still the one on display.
    pub fn finish(&self, request_id: &str) {
        if self.is_showing(request_id) {
            let _ = self.transition(TranslationStatus::Done {
                request_id: request_id.to_string(),
            });
        }
    }

    /// Record a failure and schedule its dismissal. Needs a tokio runtime.
    pub fn fail(&self, request_id: &str, message: impl Into<String>) {
        let failed = TranslationStatus::Failed {
            request_id: request_id.to_string(),
            message: message.into(),
        };
        if self.transition(failed.clone()).is_err() {
            return;
        }

        let tx = self.tx.clone();
        let delay = self.dismiss_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tx.send_if_modified(|current| {
                if *current == failed {
                    *current = TranslationStatus::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }

    fn is_showing(&self, request_id: &str) -> bool {
        matches!(
            &*self.tx.borrow(),
            TranslationStatus::Translating { request_id: id } if id == request_id
        )
    }
}
