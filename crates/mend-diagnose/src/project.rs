//! Project checks: inspect the monitored application's source tree.
//!
//! All paths come from `[project]` and are resolved against its root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use walkdir::WalkDir;

use mend_core::config::ProjectSettings;
use mend_core::{IssueKind, Severity};

use crate::check::{CheckContext, CheckError, CheckFuture, CheckOutcome, DiagnosticCheck};

async fn exists(path: &Path) -> Result<bool, CheckError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| CheckError::io(path, e))
}

/// Whether `dir` holds at least one regular file, at any depth.
async fn has_files(dir: PathBuf) -> Result<bool, CheckError> {
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&dir).min_depth(1) {
            let entry = entry.map_err(|e| CheckError::Other(format!("{}: {e}", dir.display())))?;
            if entry.file_type().is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    })
    .await
    .map_err(|e| CheckError::Other(e.to_string()))?
}

// ── build_status ───────────────────────────────────────────────────

/// The build output directory must exist.
pub struct BuildArtifactCheck {
    project: Arc<ProjectSettings>,
}

impl BuildArtifactCheck {
    pub fn new(project: Arc<ProjectSettings>) -> Self {
        Self { project }
    }
}

impl DiagnosticCheck for BuildArtifactCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::BuildStatus
    }

    fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            let build_dir = self.project.path(&self.project.build_dir);
            if !exists(&build_dir).await? {
                return Ok(CheckOutcome::unhealthy(
                    "Build files missing - needs rebuild",
                    Severity::High,
                ));
            }
            Ok(CheckOutcome::healthy("Build files exist"))
        })
    }
}

// ── dependencies ───────────────────────────────────────────────────

/// The package manifest and the installed dependency directory must exist.
pub struct DependencyCheck {
    project: Arc<ProjectSettings>,
}

impl DependencyCheck {
    pub fn new(project: Arc<ProjectSettings>) -> Self {
        Self { project }
    }
}

impl DiagnosticCheck for DependencyCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::Dependencies
    }

    fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            let p = &self.project;
            if !exists(&p.path(&p.manifest)).await? {
                return Ok(CheckOutcome::unhealthy(
                    format!("{} missing", p.manifest),
                    Severity::High,
                ));
            }
            if !exists(&p.path(&p.dependency_dir)).await? {
                return Ok(CheckOutcome::unhealthy(
                    format!("{} missing - needs install", p.dependency_dir),
                    Severity::High,
                ));
            }
            Ok(CheckOutcome::healthy("Dependencies OK"))
        })
    }
}

// ── configuration ──────────────────────────────────────────────────

/// Every configured config file must exist. Reports the first one missing.
pub struct ConfigFilesCheck {
    project: Arc<ProjectSettings>,
}

impl ConfigFilesCheck {
    pub fn new(project: Arc<ProjectSettings>) -> Self {
        Self { project }
    }
}

impl DiagnosticCheck for ConfigFilesCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::Configuration
    }

    fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            for file in &self.project.config_files {
                if !exists(&self.project.path(file)).await? {
                    return Ok(CheckOutcome::unhealthy(
                        format!("{file} missing"),
                        Severity::Medium,
                    ));
                }
            }
            Ok(CheckOutcome::healthy("Configuration OK"))
        })
    }
}

// ── routing ────────────────────────────────────────────────────────

/// If the router file exists it must mention a router (`router_pattern`).
///
/// A missing router file is left to the components check.
pub struct RoutingCheck {
    project: Arc<ProjectSettings>,
}

impl RoutingCheck {
    pub fn new(project: Arc<ProjectSettings>) -> Self {
        Self { project }
    }
}

impl DiagnosticCheck for RoutingCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::Routing
    }

    fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            let p = &self.project;
            let router = p.path(&p.router_file);
            if !exists(&router).await? {
                return Ok(CheckOutcome::healthy("Routing OK"));
            }

            let pattern = Regex::new(&p.router_pattern).map_err(|e| CheckError::Pattern {
                pattern: p.router_pattern.clone(),
                reason: e.to_string(),
            })?;
            let content = tokio::fs::read_to_string(&router)
                .await
                .map_err(|e| CheckError::io(&router, e))?;

            if !pattern.is_match(&content) {
                return Ok(CheckOutcome::unhealthy(
                    "Routing not properly configured",
                    Severity::Medium,
                ));
            }
            Ok(CheckOutcome::healthy("Routing OK"))
        })
    }
}

// ── components ─────────────────────────────────────────────────────

/// Every required component path must exist; directories must not be empty.
pub struct ComponentsCheck {
    project: Arc<ProjectSettings>,
}

impl ComponentsCheck {
    pub fn new(project: Arc<ProjectSettings>) -> Self {
        Self { project }
    }
}

impl DiagnosticCheck for ComponentsCheck {
    fn kind(&self) -> IssueKind {
        IssueKind::Components
    }

    fn run<'a>(&'a self, _ctx: &'a CheckContext) -> CheckFuture<'a> {
        Box::pin(async move {
            for relative in &self.project.component_paths {
                let path = self.project.path(relative);
                if !exists(&path).await? {
                    return Ok(CheckOutcome::unhealthy(
                        format!("{relative} missing"),
                        Severity::Medium,
                    ));
                }
                if path.is_dir() && !has_files(path).await? {
                    return Ok(CheckOutcome::unhealthy(
                        format!("{relative} is empty"),
                        Severity::Medium,
                    ));
                }
            }
            Ok(CheckOutcome::healthy("Components OK"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::healthy_project;
    use std::fs;

    fn ctx() -> CheckContext {
        CheckContext::new("main", "http://127.0.0.1:3000")
    }

    #[tokio::test]
    async fn healthy_tree_passes_every_check() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        let checks: Vec<Box<dyn DiagnosticCheck>> = vec![
            Box::new(BuildArtifactCheck::new(project.clone())),
            Box::new(DependencyCheck::new(project.clone())),
            Box::new(ConfigFilesCheck::new(project.clone())),
            Box::new(RoutingCheck::new(project.clone())),
            Box::new(ComponentsCheck::new(project)),
        ];
        for check in checks {
            let outcome = check.run(&ctx()).await.unwrap();
            assert!(outcome.healthy, "{} failed: {}", check.kind(), outcome.description);
        }
    }

    #[tokio::test]
    async fn missing_build_dir_is_high() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_dir_all(dir.path().join("dist")).unwrap();

        let outcome = BuildArtifactCheck::new(project).run(&ctx()).await.unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::unhealthy("Build files missing - needs rebuild", Severity::High)
        );
    }

    #[tokio::test]
    async fn dependency_check_reports_manifest_before_modules() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_dir_all(dir.path().join("node_modules")).unwrap();

        let check = DependencyCheck::new(project);
        let outcome = check.run(&ctx()).await.unwrap();
        assert_eq!(outcome.description, "node_modules missing - needs install");

        fs::remove_file(dir.path().join("package.json")).unwrap();
        let outcome = check.run(&ctx()).await.unwrap();
        assert_eq!(outcome.description, "package.json missing");
        assert_eq!(outcome.severity, Some(Severity::High));
    }

    #[tokio::test]
    async fn first_missing_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_file(dir.path().join(".env")).unwrap();
        fs::remove_file(dir.path().join("tsconfig.json")).unwrap();

        let outcome = ConfigFilesCheck::new(project).run(&ctx()).await.unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::unhealthy("tsconfig.json missing", Severity::Medium)
        );
    }

    #[tokio::test]
    async fn router_without_routes_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::write(dir.path().join("src/App.tsx"), "export default () => null").unwrap();

        let outcome = RoutingCheck::new(project).run(&ctx()).await.unwrap();
        assert!(!outcome.healthy);
        assert_eq!(outcome.description, "Routing not properly configured");
    }

    #[tokio::test]
    async fn absent_router_file_is_not_a_routing_problem() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_file(dir.path().join("src/App.tsx")).unwrap();

        assert!(RoutingCheck::new(project).run(&ctx()).await.unwrap().healthy);
    }

    #[tokio::test]
    async fn invalid_router_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        healthy_project(dir.path());
        let mut settings = ProjectSettings::rooted_at(dir.path());
        settings.router_pattern = "(unclosed".to_string();

        let result = RoutingCheck::new(Arc::new(settings)).run(&ctx()).await;
        assert!(matches!(result, Err(CheckError::Pattern { .. })));
    }

    #[tokio::test]
    async fn empty_component_dir_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_file(dir.path().join("src/pages/Home.tsx")).unwrap();

        let outcome = ComponentsCheck::new(project).run(&ctx()).await.unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::unhealthy("src/pages is empty", Severity::Medium)
        );
    }

    #[tokio::test]
    async fn missing_component_path_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let project = healthy_project(dir.path());
        fs::remove_dir_all(dir.path().join("src/components")).unwrap();

        let outcome = ComponentsCheck::new(project).run(&ctx()).await.unwrap();
        assert_eq!(outcome.description, "src/components/dashboard missing");
    }
}
