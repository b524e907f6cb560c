//! Wire a controller from configuration.

use std::sync::Arc;

use mend_core::{Endpoint, MendConfig};
use mend_diagnose::DiagnosticPipeline;
use mend_notify::Notifier;
use mend_probe::HealthProbe;
use mend_remedy::RemediationDispatcher;
use mend_state::SystemState;

use crate::agent::{AgentContext, EndpointAgent};
use crate::controller::LoopController;
use crate::error::AgentResult;

/// One agent per configured endpoint, all sharing the HTTP transport,
/// the standard diagnostic pipeline and the dispatcher.
pub fn assemble(
    config: &MendConfig,
    state: SystemState,
    notifier: Arc<dyn Notifier>,
) -> AgentResult<LoopController> {
    let schedule = config.loop_settings()?;
    let probe = HealthProbe::http(&config.probe_settings()?)?;
    let pipeline = DiagnosticPipeline::standard(probe.transport().clone(), config.project_settings());
    let dispatcher = RemediationDispatcher::new(config.remedy_settings()?);

    let ctx = AgentContext {
        probe,
        pipeline,
        dispatcher,
        notifier: notifier.clone(),
        state: state.clone(),
        settle_delay: schedule.settle_delay,
    };

    let agents = config
        .endpoints
        .iter()
        .map(|(id, url)| EndpointAgent::new(Endpoint::new(id, url), ctx.clone()))
        .collect();

    Ok(LoopController::new(agents, state, notifier, schedule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use mend_core::ConfigError;
    use mend_notify::MemoryNotifier;

    #[tokio::test]
    async fn one_agent_per_endpoint_sorted_by_id() {
        let config = MendConfig::scaffold(&[
            ("carrier", "http://127.0.0.1:3000/carrier"),
            ("broker", "http://127.0.0.1:3000/broker"),
        ]);
        let controller = assemble(
            &config,
            SystemState::in_memory().unwrap(),
            Arc::new(MemoryNotifier::new()),
        )
        .unwrap();

        let mut ids = Vec::new();
        for agent in controller.agents() {
            ids.push(agent.id().await);
            assert!(agent.is_healthy().await);
        }
        assert_eq!(ids, vec!["broker", "carrier"]);
    }

    #[test]
    fn bad_durations_are_rejected() {
        let mut config = MendConfig::scaffold(&[("main", "http://127.0.0.1:3000")]);
        config.schedule.as_mut().unwrap().interval = Some("soon".to_string());
        let result = assemble(
            &config,
            SystemState::in_memory().unwrap(),
            Arc::new(MemoryNotifier::new()),
        );
        assert!(matches!(result, Err(AgentError::Config(ConfigError::BadDuration { .. }))));
    }
}
