//! Loop controller: the two timers that drive every agent.
//!
//! The main timer fans a health check out to every agent and is
//! single-flight: a tick that lands while an iteration is still running
//! is dropped. The summary timer only reads cached health and never
//! touches the network.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, error, info, warn};

use mend_core::config::LoopSettings;
use mend_core::task::join_error_message;
use mend_notify::{Event, EventKind, Notifier};
use mend_state::SystemState;

use crate::agent::EndpointAgent;
use crate::error::{AgentError, AgentResult};

/// Outcome of one main iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IterationSummary {
    pub healthy: usize,
    pub unhealthy: usize,
    pub total_checks: u64,
}

pub struct LoopController {
    agents: Vec<Arc<EndpointAgent>>,
    state: SystemState,
    notifier: Arc<dyn Notifier>,
    settings: LoopSettings,
}

impl LoopController {
    pub fn new(
        agents: Vec<Arc<EndpointAgent>>,
        state: SystemState,
        notifier: Arc<dyn Notifier>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            agents,
            state,
            notifier,
            settings,
        }
    }

    pub fn agents(&self) -> &[Arc<EndpointAgent>] {
        &self.agents
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    /// One main iteration. Returns `None` if another is already running.
    pub async fn run_iteration(&self) -> Option<IterationSummary> {
        let Some(_guard) = self.state.try_begin_iteration() else {
            debug!("previous iteration still running, skipping");
            return None;
        };
        let total_checks = self.state.record_iteration();
        debug!(iteration = total_checks, agents = self.agents.len(), "iteration started");

        let mut checks = JoinSet::new();
        for agent in &self.agents {
            let agent = Arc::clone(agent);
            checks.spawn(async move {
                let id = agent.id().await;
                let task = {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move { agent.check_health().await })
                };
                (id, task.await)
            });
        }

        let mut healthy = 0;
        let mut unhealthy = 0;
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((_, Ok(true))) => healthy += 1,
                Ok((_, Ok(false))) => unhealthy += 1,
                Ok((id, Err(join_err))) => {
                    unhealthy += 1;
                    let message = join_error_message(join_err);
                    error!(endpoint = %id, error = %message, "health check task failed");
                    self.send(
                        &Event::new(EventKind::IterationError)
                            .with("endpoint", id)
                            .with("error", message),
                    )
                    .await;
                }
                Err(join_err) => {
                    unhealthy += 1;
                    error!(error = %join_err, "health check task failed");
                }
            }
        }

        let counters = self.state.counters();
        let summary = IterationSummary {
            healthy,
            unhealthy,
            total_checks,
        };
        info!(
            healthy,
            unhealthy,
            total_checks,
            successful_fixes = counters.successful_fixes,
            failed_fixes = counters.failed_fixes,
            "iteration complete"
        );
        self.send(
            &Event::new(EventKind::HealthSummary)
                .with("healthy_endpoints", healthy)
                .with("unhealthy_endpoints", unhealthy)
                .with("total_checks", counters.total_checks)
                .with("successful_fixes", counters.successful_fixes)
                .with("failed_fixes", counters.failed_fixes)
                .with("total_reports", counters.total_reports),
        )
        .await;
        Some(summary)
    }

    /// Ids of endpoints whose cached health is bad. Sends
    /// `health_warning` when there are any.
    pub async fn summarize(&self) -> Vec<String> {
        let mut unhealthy = Vec::new();
        for agent in &self.agents {
            if !agent.is_healthy().await {
                unhealthy.push(agent.id().await);
            }
        }

        if !unhealthy.is_empty() {
            warn!(count = unhealthy.len(), endpoints = ?unhealthy, "unhealthy endpoints");
            self.send(
                &Event::new(EventKind::HealthWarning)
                    .with("unhealthy_count", unhealthy.len())
                    .with("endpoints", unhealthy.clone()),
            )
            .await;
        }
        unhealthy
    }

    /// Drive both timers until `shutdown` fires.
    ///
    /// An iteration already running when `shutdown` fires is allowed to
    /// finish, so every started cycle records its report before this
    /// returns. Returns `Err` if an iteration task dies; that is a
    /// controller fault, not an endpoint failure.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> AgentResult<()> {
        info!(
            interval = ?self.settings.interval,
            summary_interval = ?self.settings.summary_interval,
            agents = self.agents.len(),
            "loop controller started"
        );
        let main = Arc::clone(&self).main_loop(shutdown.clone());
        tokio::pin!(main);
        let result = tokio::select! {
            r = &mut main => r,
            () = self.summary_loop(shutdown) => main.await,
        };
        info!("loop controller stopped");
        result
    }

    async fn main_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> AgentResult<()> {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: JoinSet<Option<IterationSummary>> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let controller = Arc::clone(&self);
                    in_flight.spawn(async move { controller.run_iteration().await });
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(join_err) = done {
                        return Err(AgentError::Controller(join_error_message(join_err)));
                    }
                }
                _ = shutdown.changed() => {
                    debug!(in_flight = in_flight.len(), "main loop shutting down");
                    while let Some(done) = in_flight.join_next().await {
                        if let Err(join_err) = done {
                            return Err(AgentError::Controller(join_error_message(join_err)));
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn summary_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.settings.summary_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.summarize().await;
                }
                _ = shutdown.changed() => {
                    debug!("summary loop shutting down");
                    return;
                }
            }
        }
    }

    async fn send(&self, event: &Event) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!(event = event.name(), error = %e, "notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use std::time::Duration;

    fn settings() -> LoopSettings {
        LoopSettings {
            interval: Duration::from_millis(50),
            summary_interval: Duration::from_millis(50),
            settle_delay: Duration::ZERO,
        }
    }

    fn controller(fixture: &Fixture, ids: &[&str]) -> Arc<LoopController> {
        let agents = ids.iter().map(|id| fixture.agent(id)).collect();
        Arc::new(LoopController::new(
            agents,
            fixture.state.clone(),
            fixture.notifier.clone(),
            settings(),
        ))
    }

    #[tokio::test]
    async fn iteration_counts_and_summarizes() {
        let fixture = Fixture::new(vec![ok_page()]);
        let controller = controller(&fixture, &["a", "b", "c"]);

        let summary = controller.run_iteration().await.unwrap();
        assert_eq!(
            summary,
            IterationSummary {
                healthy: 3,
                unhealthy: 0,
                total_checks: 1
            }
        );
        assert!(!fixture.state.is_iteration_running());

        let events = fixture.notifier.named("health_summary");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("healthy_endpoints").and_then(|v| v.as_u64()), Some(3));
        assert_eq!(events[0].get("total_checks").and_then(|v| v.as_u64()), Some(1));
    }

    #[tokio::test]
    async fn overlapping_triggers_run_one_iteration() {
        let fixture = Fixture::new(vec![ok_page()]).slow(Duration::from_millis(200));
        let controller = controller(&fixture, &["a"]);

        let (first, second, third) = tokio::join!(
            controller.run_iteration(),
            controller.run_iteration(),
            controller.run_iteration()
        );
        let ran = [first, second, third].iter().filter(|s| s.is_some()).count();
        assert_eq!(ran, 1);
        assert_eq!(fixture.state.counters().total_checks, 1);
        assert_eq!(fixture.transport.calls(), 1);

        assert!(controller.run_iteration().await.is_some());
        assert_eq!(fixture.state.counters().total_checks, 2);
    }

    #[tokio::test]
    async fn a_panicking_agent_does_not_stall_the_others() {
        let fixture = Fixture::new(vec![ok_page()]).panic_after(1);
        let controller = controller(&fixture, &["a", "b", "c"]);

        let summary = controller.run_iteration().await.unwrap();
        assert_eq!(summary.healthy + summary.unhealthy, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.unhealthy, 2);
        assert_eq!(fixture.notifier.named("iteration_error").len(), 2);
        assert_eq!(fixture.notifier.named("health_summary").len(), 1);
        assert!(!fixture.state.is_iteration_running());
    }

    #[tokio::test]
    async fn summary_reads_cached_health_only() {
        let fixture = Fixture::new(vec![status(503)]);
        let controller = controller(&fixture, &["a"]);

        assert!(controller.summarize().await.is_empty());
        assert!(fixture.notifier.events().is_empty());
        assert_eq!(fixture.transport.calls(), 0);

        controller.run_iteration().await.unwrap();
        let calls = fixture.transport.calls();

        assert_eq!(controller.summarize().await, vec!["a".to_string()]);
        assert_eq!(fixture.transport.calls(), calls);
        assert_eq!(fixture.notifier.named("health_warning").len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let fixture = Fixture::new(vec![ok_page()]);
        let controller = controller(&fixture, &["a"]);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::clone(&controller).run(rx));
        tokio::time::sleep(Duration::from_millis(180)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("controller stops promptly")
            .unwrap();
        assert!(result.is_ok());
        assert!(fixture.state.counters().total_checks >= 1);
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_running_cycle() {
        let fixture = Fixture::new(vec![status(503)]).slow(Duration::from_millis(300));
        let controller = controller(&fixture, &["a"]);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::clone(&controller).run(rx));
        // First tick fires at once; probe, diagnose and verify take ~900ms.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fixture.state.is_iteration_running());
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("controller stops once the cycle is done")
            .unwrap();
        assert!(result.is_ok());

        let counters = fixture.state.counters();
        assert_eq!(counters.total_checks, 1);
        assert_eq!(counters.total_reports, 1);
        assert_eq!(counters.failed_fixes, 1);
        assert_eq!(fixture.notifier.named("endpoint_fix_report").len(), 1);
        assert_eq!(fixture.notifier.named("health_summary").len(), 1);
        assert!(!fixture.state.is_iteration_running());
    }
}
