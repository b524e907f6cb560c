//! Health probe logic.
//!
//! Turns a transport outcome into a verdict. The same probe is used to
//! detect an unhealthy endpoint and to verify it after remediation.

use std::sync::Arc;

use mend_core::config::ProbeSettings;
use tracing::{debug, warn};

use crate::error::TransportResult;
use crate::transport::{HttpTransport, Response, Transport};

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// 2xx with a plausible body.
    Healthy,
    /// The endpoint answered, but not well enough.
    Unhealthy { status: u16, body_len: usize },
    /// The request could not be completed (connection error or timeout).
    Failed { error: String },
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy)
    }
}

/// Judge a transport outcome.
///
/// Healthy requires a 2xx status and a body strictly longer than
/// `min_body_bytes`.
pub fn assess(outcome: &TransportResult<Response>, min_body_bytes: usize) -> ProbeResult {
    match outcome {
        Ok(resp) if resp.is_success() && resp.body.len() > min_body_bytes => ProbeResult::Healthy,
        Ok(resp) => ProbeResult::Unhealthy {
            status: resp.status,
            body_len: resp.body.len(),
        },
        Err(e) => ProbeResult::Failed {
            error: e.to_string(),
        },
    }
}

/// Probes endpoints through a shared transport.
#[derive(Clone)]
pub struct HealthProbe {
    transport: Arc<dyn Transport>,
    min_body_bytes: usize,
}

impl HealthProbe {
    pub fn new(transport: Arc<dyn Transport>, min_body_bytes: usize) -> Self {
        Self {
            transport,
            min_body_bytes,
        }
    }

    /// A probe over [`HttpTransport`] configured from `[probe]`.
    pub fn http(settings: &ProbeSettings) -> TransportResult<Self> {
        Ok(Self::new(
            Arc::new(HttpTransport::new(settings.timeout)?),
            settings.min_body_bytes,
        ))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Probe one endpoint.
    pub async fn check(&self, endpoint_id: &str, url: &str) -> ProbeResult {
        let outcome = self.transport.get(url).await;
        let result = assess(&outcome, self.min_body_bytes);
        match &result {
            ProbeResult::Healthy => debug!(endpoint = %endpoint_id, "endpoint healthy"),
            ProbeResult::Unhealthy { status, body_len } => warn!(
                endpoint = %endpoint_id,
                status,
                body_len,
                min_body_bytes = self.min_body_bytes,
                "endpoint unhealthy"
            ),
            ProbeResult::Failed { error } => {
                warn!(endpoint = %endpoint_id, %error, "endpoint unreachable")
            }
        }
        result
    }
}
