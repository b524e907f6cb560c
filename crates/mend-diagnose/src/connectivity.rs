//! Connectivity check: can the endpoint serve anything at all?

use std::sync::Arc;

use mend_core::{IssueKind, Severity};
use mend_probe::Transport;

use crate::check::{CheckContext, CheckFuture, CheckOutcome, DiagnosticCheck};

/// Healthy while the endpoint answers with a status below 500.
///
/// Client errors and short bodies pass here: they point at the
/// application rather than the server being down.
pub struct ConnectivityCheck {
    transport: Arc<dyn Transport>,
}

impl ConnectivityCheck {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl DiagnosticCheck for ConnectivityCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::Connectivity
    }

    fn run<'a>(&'a self, ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            let outcome = match self.transport.get(&ctx.url).await {
                Ok(resp) if resp.status < 500 => CheckOutcome::healthy("Connectivity OK"),
                Ok(resp) => CheckOutcome::unhealthy(format!("Server error: {}", resp.status), Severity::High),
                Err(e) => CheckOutcome::unhealthy(format!("Connection failed: {e}"), Severity::High),
            };
            Ok(outcome)
        })
    }
}
