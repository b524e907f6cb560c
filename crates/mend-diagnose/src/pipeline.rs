//! The ordered diagnostic pipeline.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mend_core::config::ProjectSettings;
use mend_core::task::join_error_message;
use mend_core::{Diagnosis, Issue, IssueKind, Severity};
use mend_probe::Transport;

use crate::check::{CheckContext, DiagnosticCheck};
use crate::connectivity::ConnectivityCheck;
use crate::project::{BuildArtifactCheck, ComponentsCheck, ConfigFilesCheck, DependencyCheck, RoutingCheck};

/// Runs a fixed list of checks, in order, against one endpoint.
#[derive(Clone, Default)]
pub struct DiagnosticPipeline {
    checks: Vec<Arc<dyn DiagnosticCheck>>,
}

impl DiagnosticPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in check set: connectivity, then the project checks.
    pub fn standard(transport: Arc<dyn Transport>, project: ProjectSettings) -> Self {
        let project = Arc::new(project);
        Self::new()
            .with_check(ConnectivityCheck::new(transport))
            .with_check(BuildArtifactCheck::new(project.clone()))
            .with_check(DependencyCheck::new(project.clone()))
            .with_check(ConfigFilesCheck::new(project.clone()))
            .with_check(RoutingCheck::new(project.clone()))
            .with_check(ComponentsCheck::new(project))
    }

    /// Append a check. Checks run in the order they were added.
    pub fn with_check(mut self, check: impl DiagnosticCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn check_kinds(&self) -> Vec<IssueKind> {
        self.checks.iter().map(|c| c.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check sequentially and collect one issue per failure.
    ///
    /// Each check runs on its own task so that a panic is contained; an
    /// error or panic is recorded as a high-severity issue of that check's
    /// kind and the remaining checks still run.
    pub async fn diagnose(&self, ctx: &CheckContext) -> Diagnosis {
        let mut diagnosis = Diagnosis::new(&ctx.endpoint_id);
        let ctx = Arc::new(ctx.clone());

        for check in &self.checks {
            let kind = check.kind();
            let task = {
                let check = Arc::clone(check);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { check.run(&ctx).await })
            };

            let issue = match task.await {
                Ok(Ok(outcome)) if outcome.healthy => {
                    debug!(endpoint = %ctx.endpoint_id, check = %kind, "check passed");
                    None
                }
                Ok(Ok(outcome)) => Some(Issue {
                    kind,
                    description: outcome.description,
                    severity: outcome.severity.unwrap_or_default(),
                }),
                Ok(Err(e)) => {
                    warn!(endpoint = %ctx.endpoint_id, check = %kind, error = %e, "check errored");
                    Some(check_failed(kind, &e.to_string()))
                }
                Err(join_err) => {
                    warn!(endpoint = %ctx.endpoint_id, check = %kind, error = %join_err, "check panicked");
                    Some(check_failed(kind, &join_error_message(join_err)))
                }
            };

            if let Some(issue) = issue {
                diagnosis.issues.push(issue);
            }
        }

        info!(
            endpoint = %ctx.endpoint_id,
            checks = self.checks.len(),
            issues = diagnosis.issues.len(),
            "diagnosis complete"
        );
        diagnosis
    }
}

fn check_failed(kind: IssueKind, message: &str) -> Issue {
    Issue {
        kind,
        description: format!("Check failed: {message}"),
        severity: Severity::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckError, CheckFuture, CheckOutcome};
    use crate::testutil::healthy_project;
    use mend_probe::{Response, TransportFuture};
    use std::collections::BTreeMap;

    /// A check with a canned verdict.
    struct Scripted {
        kind: IssueKind,
        verdict: fn() -> Result<CheckOutcome, CheckError>,
    }

    impl DiagnosticCheck for Scripted {
        fn kind(&self) -> IssueKind {
            self.kind.clone()
        }

        fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
            let verdict = self.verdict;
            Box::pin(async move { verdict() })
        }
    }

    struct Panics;

    impl DiagnosticCheck for Panics {
        fn kind(&self) -> IssueKind {
            IssueKind::Custom("exploding".to_string())
        }

        fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
            Box::pin(async move { panic!("boom") })
        }
    }

    struct Status(u16);

    impl Transport for Status {
        fn get<'a>(&'a self, _url: &'a str) -> TransportFuture<'a> {
            let status = self.0;
            Box::pin(async move {
                Ok(Response {
                    status,
                    body: "x".repeat(150),
                    headers: BTreeMap::new(),
                })
            })
        }
    }

    fn ctx() -> CheckContext {
        CheckContext::new("main", "http://127.0.0.1:3000")
    }

    fn scripted(kind: IssueKind, verdict: fn() -> Result<CheckOutcome, CheckError>) -> Scripted {
        Scripted { kind, verdict }
    }

    #[tokio::test]
    async fn issues_follow_check_order_and_skip_healthy() {
        let pipeline = DiagnosticPipeline::new()
            .with_check(scripted(IssueKind::Connectivity, || {
                Ok(CheckOutcome::unhealthy("Server error: 503", Severity::High))
            }))
            .with_check(scripted(IssueKind::BuildStatus, || Ok(CheckOutcome::healthy("ok"))))
            .with_check(scripted(IssueKind::Routing, || {
                Ok(CheckOutcome::unhealthy("no routes", Severity::Low))
            }));

        let diagnosis = pipeline.diagnose(&ctx()).await;
        assert_eq!(diagnosis.endpoint_id, "main");
        let kinds: Vec<_> = diagnosis.issues.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(kinds, vec![IssueKind::Connectivity, IssueKind::Routing]);
        assert_eq!(diagnosis.issues[1].severity, Severity::Low);
    }

    #[tokio::test]
    async fn missing_severity_defaults_to_medium() {
        let pipeline = DiagnosticPipeline::new().with_check(scripted(IssueKind::Components, || {
            Ok(CheckOutcome {
                healthy: false,
                description: "gone".to_string(),
                severity: None,
            })
        }));
        let diagnosis = pipeline.diagnose(&ctx()).await;
        assert_eq!(diagnosis.issues[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn errors_become_high_severity_issues() {
        let pipeline = DiagnosticPipeline::new()
            .with_check(scripted(IssueKind::Dependencies, || {
                Err(CheckError::Other("permission denied".to_string()))
            }))
            .with_check(scripted(IssueKind::Routing, || Ok(CheckOutcome::healthy("ok"))));

        let diagnosis = pipeline.diagnose(&ctx()).await;
        assert_eq!(
            diagnosis.issues,
            vec![Issue {
                kind: IssueKind::Dependencies,
                description: "Check failed: permission denied".to_string(),
                severity: Severity::High,
            }]
        );
    }

    #[tokio::test]
    async fn panicking_check_does_not_abort_pipeline() {
        let pipeline = DiagnosticPipeline::new()
            .with_check(Panics)
            .with_check(scripted(IssueKind::BuildStatus, || {
                Ok(CheckOutcome::unhealthy("missing", Severity::High))
            }));

        let diagnosis = pipeline.diagnose(&ctx()).await;
        assert_eq!(diagnosis.issues.len(), 2);
        assert_eq!(diagnosis.issues[0].description, "Check failed: boom");
        assert_eq!(diagnosis.issues[0].severity, Severity::High);
        assert_eq!(diagnosis.issues[1].kind, IssueKind::BuildStatus);
    }

    #[tokio::test]
    async fn standard_pipeline_runs_builtins_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        let pipeline = DiagnosticPipeline::standard(Arc::new(Status(200)), (*project).clone());
        assert_eq!(
            pipeline.check_kinds(),
            vec![
                IssueKind::Connectivity,
                IssueKind::BuildStatus,
                IssueKind::Dependencies,
                IssueKind::Configuration,
                IssueKind::Routing,
                IssueKind::Components,
            ]
        );
    }

    #[tokio::test]
    async fn healthy_target_diagnoses_clean_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        let pipeline = DiagnosticPipeline::standard(Arc::new(Status(200)), (*project).clone());

        let first = pipeline.diagnose(&ctx()).await;
        let second = pipeline.diagnose(&ctx()).await;
        assert!(first.is_clean(), "unexpected issues: {:?}", first.issues);
        assert!(second.is_clean(), "unexpected issues: {:?}", second.issues);
    }

    #[tokio::test]
    async fn server_error_yields_single_connectivity_issue() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        let pipeline = DiagnosticPipeline::standard(Arc::new(Status(503)), (*project).clone());

        let diagnosis = pipeline.diagnose(&ctx()).await;
        assert_eq!(
            diagnosis.issues,
            vec![Issue {
                kind: IssueKind::Connectivity,
                description: "Server error: 503".to_string(),
                severity: Severity::High,
            }]
        );
    }
}
