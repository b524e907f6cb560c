//! mend-probe — outbound HTTP and health verdicts.
//!
//! # Architecture
//!
//! ```text
//! HealthProbe
//!   ├── Arc<dyn Transport>            (HttpTransport in production)
//!   │   └── request_with(url, timeout, tls) → Response | TransportError
//!   └── assess(response, min_body_bytes) → ProbeResult
//! ```
//!
//! The transport never retries. `https://` endpoints are verified against
//! the Mozilla root store via rustls. A timeout drops the in-flight request
//! future, which owns the hyper connection and TLS session, so the socket
//! is closed rather than left running in the background.
//!
//! A response counts as healthy when the status is 2xx and the body is
//! longer than the configured plausibility threshold; this filters out
//! "200 OK" pages that render blank.

pub mod error;
pub mod probe;
pub mod tls;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use probe::{HealthProbe, ProbeResult, assess};
pub use tls::{client_config, webpki_client_config};
pub use transport::{HttpTransport, Response, Transport, TransportFuture, request, request_with};
