//! Notifier implementations.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::{debug, info, warn};

use mend_core::config::NotifySettings;

use crate::error::{NotifyError, NotifyResult};
use crate::event::Event;
use crate::signing::{IdempotencyKeys, sign};

pub const SIGNATURE_HEADER: &str = "X-Signature-256";
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = NotifyResult<()>> + Send + 'a>>;

/// Delivers events to an external observer.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, event: &'a Event) -> NotifyFuture<'a>;
}

/// Build the notifier `[notify]` asks for: a webhook when a sink URL is
/// configured, otherwise one that only logs.
pub fn from_settings(settings: &NotifySettings) -> NotifyResult<Arc<dyn Notifier>> {
    match &settings.url {
        Some(url) => {
            info!(%url, "webhook notifications enabled");
            Ok(Arc::new(WebhookNotifier::new(url, settings)?))
        }
        None => {
            info!("no notification sink configured, events will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

// ── Webhook ────────────────────────────────────────────────────────

/// Signed JSON POSTs with an idempotency key and optional retries.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    secret: String,
    max_retries: u32,
    retry_backoff: std::time::Duration,
    keys: IdempotencyKeys,
}

impl WebhookNotifier {
    pub fn new(url: &str, settings: &NotifySettings) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            secret: settings.secret.clone(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
            keys: IdempotencyKeys::default(),
        })
    }

    async fn deliver(&self, event: &Event) -> NotifyResult<()> {
        let body = event.to_body()?;
        let signature = sign(&self.secret, &body)?;
        let key = self.keys.next_key();

        let mut attempt = 0;
        loop {
            match self.post(&body, &signature, &key).await {
                Ok(()) => {
                    debug!(event = event.name(), %key, attempt, "notification delivered");
                    return Ok(());
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(event = event.name(), %key, attempt, error = %e, ?delay, "notification failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, body: &[u8], signature: &str, key: &str) -> NotifyResult<()> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(SIGNATURE_HEADER, signature)
            .header(IDEMPOTENCY_HEADER, key)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status {
                status: status.as_u16(),
            })
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, event: &'a Event) -> NotifyFuture<'a> {
        Box::pin(self.deliver(event))
    }
}

// ── Log only ───────────────────────────────────────────────────────

/// Used when no sink is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, event: &'a Event) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!(event = event.name(), payload = %event_fields(event), "notification (no sink)");
            Ok(())
        })
    }
}

fn event_fields(event: &Event) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or_default()
}

// ── In memory ──────────────────────────────────────────────────────

/// Keeps every event it is given. Useful for `mendd check` and tests.
#[derive(Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<Event>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn named(&self, name: &str) -> Vec<Event> {
        self.events().into_iter().filter(|e| e.name() == name).collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify<'a>(&'a self, event: &'a Event) -> NotifyFuture<'a> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Box::pin(async { Ok(()) })
    }
}
