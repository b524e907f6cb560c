//! Remediation dispatcher: one time-boxed action per diagnosed issue.

use std::sync::Arc;

use tracing::{info, warn};

use mend_core::config::RemedySettings;
use mend_core::task::join_error_message;
use mend_core::{Diagnosis, FixResult, Issue};

use crate::action::action_for;

#[derive(Clone)]
pub struct RemediationDispatcher {
    settings: Arc<RemedySettings>,
}

impl RemediationDispatcher {
    pub fn new(settings: RemedySettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RemedySettings {
        &self.settings
    }

    /// Attempt every issue, in order, regardless of earlier failures.
    ///
    /// Returns exactly one result per issue, kinds matching pairwise.
    pub async fn remediate(&self, diagnosis: &Diagnosis) -> Vec<FixResult> {
        let mut results = Vec::with_capacity(diagnosis.issues.len());
        for issue in &diagnosis.issues {
            results.push(self.apply(&diagnosis.endpoint_id, issue).await);
        }
        results
    }

    /// Run the action for one issue under `fix_timeout`.
    ///
    /// The action runs on its own task: a panic yields a failed result
    /// and expiry drops the task's future, killing the command's process
    /// group.
    pub async fn apply(&self, endpoint_id: &str, issue: &Issue) -> FixResult {
        let kind = issue.kind.clone();
        let action = action_for(&kind);
        let fix_timeout = self.settings.fix_timeout;

        info!(
            endpoint = %endpoint_id,
            issue = %kind,
            action = action.name(),
            "applying fix"
        );

        let settings = Arc::clone(&self.settings);
        let task = tokio::spawn(async move {
            tokio::time::timeout(fix_timeout, action.execute(&settings)).await
        });

        let result = match task.await {
            Ok(Ok(Ok(output))) => FixResult::succeeded(kind, output),
            Ok(Ok(Err(e))) => {
                let failed = FixResult::failed(kind, e.to_string());
                match e.output() {
                    Some(stderr) => failed.with_output(stderr),
                    None => failed,
                }
            }
            Ok(Err(_elapsed)) => FixResult::failed(kind, "timeout"),
            Err(join_err) => FixResult::failed(kind, format!("action panicked: {}", join_error_message(join_err))),
        };

        if result.success {
            info!(endpoint = %endpoint_id, issue = %result.issue_kind, "fix applied");
        } else {
            warn!(
                endpoint = %endpoint_id,
                issue = %result.issue_kind,
                error = result.error.as_deref().unwrap_or_default(),
                "fix failed"
            );
        }
        result
    }
}
