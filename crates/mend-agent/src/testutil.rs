//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mend_core::Endpoint;
use mend_core::config::RemedySettings;
use mend_diagnose::{ConnectivityCheck, DiagnosticPipeline};
use mend_notify::MemoryNotifier;
use mend_probe::{HealthProbe, Response, Transport, TransportFuture, TransportResult};
use mend_remedy::RemediationDispatcher;
use mend_state::SystemState;

use crate::agent::{AgentContext, EndpointAgent};

pub(crate) fn status(code: u16) -> TransportResult<Response> {
    Ok(Response {
        status: code,
        body: "unavailable".to_string(),
        headers: BTreeMap::new(),
    })
}

pub(crate) fn ok_page() -> TransportResult<Response> {
    Ok(Response {
        status: 200,
        body: "x".repeat(150),
        headers: BTreeMap::new(),
    })
}

pub(crate) fn short_page() -> TransportResult<Response> {
    Ok(Response {
        status: 200,
        body: "tiny".to_string(),
        headers: BTreeMap::new(),
    })
}

/// Replays responses in order, then repeats the last one forever.
pub(crate) struct Scripted {
    responses: Mutex<Vec<TransportResult<Response>>>,
    calls: AtomicUsize,
    delay: Duration,
    panic_after: Option<usize>,
}

impl Scripted {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Scripted {
    fn get<'a>(&'a self, _url: &'a str) -> TransportFuture<'a> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        };
        let delay = self.delay;
        let explode = self.panic_after.is_some_and(|n| call >= n);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if explode {
                panic!("transport exploded on call {call}");
            }
            next
        })
    }
}

pub(crate) struct Fixture {
    pub(crate) transport: Arc<Scripted>,
    pub(crate) notifier: Arc<MemoryNotifier>,
    pub(crate) state: SystemState,
    project: tempfile::TempDir,
}

impl Fixture {
    pub(crate) fn new(responses: Vec<TransportResult<Response>>) -> Self {
        Self {
            transport: Arc::new(Scripted {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                panic_after: None,
            }),
            notifier: Arc::new(MemoryNotifier::new()),
            state: SystemState::in_memory().unwrap(),
            project: tempfile::tempdir().unwrap(),
        }
    }

    pub(crate) fn panic_after(mut self, calls: usize) -> Self {
        Arc::get_mut(&mut self.transport).unwrap().panic_after = Some(calls);
        self
    }

    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        Arc::get_mut(&mut self.transport).unwrap().delay = delay;
        self
    }

    pub(crate) fn context(&self) -> AgentContext {
        let transport: Arc<dyn Transport> = self.transport.clone();
        let mut remedy = RemedySettings::rooted_at(self.project.path());
        remedy.restart_command = "echo restarted".to_string();
        AgentContext {
            probe: HealthProbe::new(transport.clone(), 100),
            pipeline: DiagnosticPipeline::new().with_check(ConnectivityCheck::new(transport)),
            dispatcher: RemediationDispatcher::new(remedy),
            notifier: self.notifier.clone(),
            state: self.state.clone(),
            settle_delay: Duration::ZERO,
        }
    }

    pub(crate) fn agent(&self, id: &str) -> Arc<EndpointAgent> {
        EndpointAgent::new(
            Endpoint::new(id, &format!("http://127.0.0.1:3000/{id}")),
            self.context(),
        )
    }
}
