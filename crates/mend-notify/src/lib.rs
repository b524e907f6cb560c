//! mend-notify — tell an external observer what happened.
//!
//! # Wire format
//!
//! ```text
//! POST <notify.url>
//! Content-Type: application/json
//! Content-Length: <n>
//! User-Agent: mend/<version>
//! X-Signature-256: sha256=<base64(HMAC-SHA256(secret, body))>
//! X-Idempotency-Key: mend-<epoch_ms>-<seq>
//!
//! {"event":"endpoint_fix_report","timestamp":...}
//! ```
//!
//! Bodies are canonical (sorted keys). Retries of one event reuse its
//! idempotency key and signature; a new event always gets a new key.

pub mod error;
pub mod event;
pub mod notifier;
pub mod signing;

pub use error::{NotifyError, NotifyResult};
pub use event::{Event, EventKind};
pub use notifier::{
    IDEMPOTENCY_HEADER, LogNotifier, MemoryNotifier, Notifier, NotifyFuture, SIGNATURE_HEADER,
    WebhookNotifier, from_settings,
};
pub use signing::{IdempotencyKeys, sign, verify};
