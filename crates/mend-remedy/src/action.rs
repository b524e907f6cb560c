//! Remediation actions and the issue-kind mapping.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use mend_core::config::{RemedySettings, ScaffoldFile};
use mend_core::IssueKind;

use crate::error::{RemedyError, RemedyResult};
use crate::group::{self, GroupGuard};

/// What to do about one kind of issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationAction {
    /// Run `build_command`.
    Build,
    /// Run `install_command`.
    Install,
    /// Write the scaffold files registered for `kind`.
    WriteScaffolds { kind: IssueKind, overwrite: bool },
    /// Run `restart_command`.
    Restart,
}

impl RemediationAction {
    pub fn name(&self) -> &'static str {
        match self {
            RemediationAction::Build => "build",
            RemediationAction::Install => "install",
            RemediationAction::WriteScaffolds { .. } => "scaffold",
            RemediationAction::Restart => "restart",
        }
    }

    /// Run the action to completion. Returns the output to report.
    ///
    /// Not time-boxed here; the dispatcher wraps this in `fix_timeout`.
    /// Dropping the future kills the command's whole process group.
    pub async fn execute(&self, settings: &RemedySettings) -> RemedyResult<String> {
        match self {
            RemediationAction::Build => run_shell(&settings.build_command, &settings.root).await,
            RemediationAction::Install => run_shell(&settings.install_command, &settings.root).await,
            RemediationAction::Restart => run_shell(&settings.restart_command, &settings.root).await,
            RemediationAction::WriteScaffolds { kind, overwrite } => {
                let files: Vec<&ScaffoldFile> = settings.scaffolds_for(kind).collect();
                if files.is_empty() {
                    return Err(RemedyError::NoScaffold(kind.to_string()));
                }
                write_scaffolds(&settings.root, &files, *overwrite).await
            }
        }
    }
}

/// Map an issue kind to its action.
pub fn action_for(kind: &IssueKind) -> RemediationAction {
    match kind {
        IssueKind::BuildStatus => RemediationAction::Build,
        IssueKind::Dependencies => RemediationAction::Install,
        IssueKind::Configuration => RemediationAction::WriteScaffolds {
            kind: IssueKind::Configuration,
            overwrite: false,
        },
        IssueKind::Routing => RemediationAction::WriteScaffolds {
            kind: IssueKind::Routing,
            overwrite: true,
        },
        IssueKind::Components => RemediationAction::WriteScaffolds {
            kind: IssueKind::Components,
            overwrite: false,
        },
        IssueKind::Connectivity | IssueKind::Custom(_) => RemediationAction::Restart,
    }
}

/// Run `command` through `sh -c` in `cwd`, capturing its output.
///
/// The shell leads its own process group. If the returned future is dropped
/// before the command exits, the whole group is killed.
pub async fn run_shell(command: &str, cwd: &Path) -> RemedyResult<String> {
    debug!(%command, cwd = %cwd.display(), "running remediation command");
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    group::isolate(&mut cmd);

    let child = cmd.spawn().map_err(|source| RemedyError::Spawn {
        command: command.to_string(),
        source,
    })?;
    let guard = GroupGuard::new(child.id());

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| RemedyError::Spawn {
            command: command.to_string(),
            source,
        })?;
    guard.disarm();

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        Err(RemedyError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}

/// Write scaffold files under `root`, creating parent directories.
///
/// Existing files are left alone unless `overwrite` is set.
async fn write_scaffolds(root: &Path, files: &[&ScaffoldFile], overwrite: bool) -> RemedyResult<String> {
    let mut written = Vec::new();
    for file in files {
        let path = root.join(&file.path);
        let present = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| RemedyError::io(&path, e))?;
        if present && !overwrite {
            continue;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemedyError::io(parent, e))?;
        }
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(|e| RemedyError::io(&path, e))?;
        written.push(file.path.as_str());
    }

    if written.is_empty() {
        Ok("nothing to write".to_string())
    } else {
        Ok(format!("wrote {}", written.join(", ")))
    }
}
