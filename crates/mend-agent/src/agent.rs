//! Endpoint agent: owns one endpoint and drives its repair cycle.
//!
//! ```text
//! Healthy ──probe fails──▶ Unhealthy ──▶ Diagnosing ──▶ Remediating
//!    ▲                                                     │ settle_delay
//!    └──────── re-probe ok ◀──────── Verifying ◀───────────┘
//!                                        │ re-probe fails
//!                                        ▼
//!                                      Failed  (retried next iteration)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use mend_core::task::join_error_message;
use mend_core::{Endpoint, FixReport, VerificationResult, epoch_millis};
use mend_diagnose::{CheckContext, DiagnosticPipeline};
use mend_notify::{Event, Notifier};
use mend_probe::HealthProbe;
use mend_remedy::RemediationDispatcher;
use mend_state::SystemState;

use crate::error::{AgentError, AgentResult};

/// Where an agent is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Healthy,
    Unhealthy,
    Diagnosing,
    Remediating,
    Verifying,
    /// Verification failed or the cycle faulted. Left alone until the
    /// next main iteration.
    Failed,
}

/// Collaborators shared by every agent.
#[derive(Clone)]
pub struct AgentContext {
    pub probe: HealthProbe,
    pub pipeline: DiagnosticPipeline,
    pub dispatcher: RemediationDispatcher,
    pub notifier: Arc<dyn Notifier>,
    pub state: SystemState,
    pub settle_delay: Duration,
}

pub struct EndpointAgent {
    endpoint: RwLock<Endpoint>,
    phase: RwLock<AgentPhase>,
    ctx: AgentContext,
}

impl EndpointAgent {
    pub fn new(endpoint: Endpoint, ctx: AgentContext) -> Arc<Self> {
        Arc::new(Self {
            endpoint: RwLock::new(endpoint),
            phase: RwLock::new(AgentPhase::Healthy),
            ctx,
        })
    }

    pub async fn endpoint(&self) -> Endpoint {
        self.endpoint.read().await.clone()
    }

    pub async fn id(&self) -> String {
        self.endpoint.read().await.id.clone()
    }

    /// Cached health from the last check. No network.
    pub async fn is_healthy(&self) -> bool {
        self.endpoint.read().await.healthy
    }

    pub async fn phase(&self) -> AgentPhase {
        *self.phase.read().await
    }

    async fn enter(&self, phase: AgentPhase) {
        let mut current = self.phase.write().await;
        if *current != phase {
            debug!(from = ?*current, to = ?phase, "agent phase change");
            *current = phase;
        }
    }

    async fn publish(&self) {
        let snapshot = self.endpoint().await;
        self.ctx.state.publish_endpoint(&snapshot).await;
    }

    /// Probe the endpoint and, if it is unhealthy, run one full repair
    /// cycle. Returns the endpoint's health afterwards.
    ///
    /// Faults inside the cycle, panics included, never escape: they are
    /// reported as `endpoint_fix_error` and the endpoint stays unhealthy.
    pub async fn check_health(self: &Arc<Self>) -> bool {
        let (id, url) = {
            let ep = self.endpoint.read().await;
            (ep.id.clone(), ep.url.clone())
        };

        let verdict = self.ctx.probe.check(&id, &url).await;
        let healthy = verdict.is_healthy();
        {
            let mut ep = self.endpoint.write().await;
            ep.healthy = healthy;
            ep.check_count += 1;
            ep.last_checked_at = Some(epoch_millis());
        }
        self.publish().await;

        if healthy {
            self.enter(AgentPhase::Healthy).await;
            return true;
        }

        self.enter(AgentPhase::Unhealthy).await;
        info!(endpoint = %id, ?verdict, "endpoint unhealthy, starting repair cycle");

        let agent = Arc::clone(self);
        let outcome = match tokio::spawn(async move { agent.repair(&id, &url).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(AgentError::Panicked(join_error_message(join_err))),
        };

        match outcome {
            Ok(report) => report.overall_success,
            Err(e) => {
                self.fault(e).await;
                false
            }
        }
    }

    /// Diagnose → remediate → settle → verify → record → report.
    async fn repair(&self, id: &str, url: &str) -> AgentResult<FixReport> {
        self.enter(AgentPhase::Diagnosing).await;
        let diagnosis = self.ctx.pipeline.diagnose(&CheckContext::new(id, url)).await;

        self.enter(AgentPhase::Remediating).await;
        let fix_results = self.ctx.dispatcher.remediate(&diagnosis).await;

        if !self.ctx.settle_delay.is_zero() {
            debug!(endpoint = %id, delay = ?self.ctx.settle_delay, "settling before verification");
            tokio::time::sleep(self.ctx.settle_delay).await;
        }

        self.enter(AgentPhase::Verifying).await;
        let verification = VerificationResult {
            success: self.ctx.probe.check(id, url).await.is_healthy(),
            timestamp: epoch_millis(),
        };

        let snapshot = {
            let mut ep = self.endpoint.write().await;
            ep.healthy = verification.success;
            if verification.success {
                ep.fix_count += 1;
            }
            ep.clone()
        };
        self.ctx.state.publish_endpoint(&snapshot).await;

        let report = FixReport::new(&snapshot, diagnosis, fix_results, verification);
        self.ctx.state.record_report(&report)?;

        if report.overall_success {
            self.enter(AgentPhase::Healthy).await;
            info!(
                endpoint = %id,
                issues = report.diagnosis.issues.len(),
                successful_fixes = report.successful_fixes(),
                "endpoint repaired"
            );
        } else {
            self.enter(AgentPhase::Failed).await;
            warn!(
                endpoint = %id,
                issues = report.diagnosis.issues.len(),
                successful_fixes = report.successful_fixes(),
                "endpoint still unhealthy after remediation"
            );
        }

        self.send(&Event::fix_report(&report)).await;
        Ok(report)
    }

    async fn fault(&self, err: AgentError) {
        let id = {
            let mut ep = self.endpoint.write().await;
            ep.healthy = false;
            ep.id.clone()
        };
        self.publish().await;
        self.enter(AgentPhase::Failed).await;
        error!(endpoint = %id, error = %err, "repair cycle faulted");
        self.send(&Event::fix_error(&id, &err.to_string())).await;
    }

    async fn send(&self, event: &Event) {
        if let Err(e) = self.ctx.notifier.notify(event).await {
            warn!(event = event.name(), error = %e, "notification failed");
        }
    }
}
