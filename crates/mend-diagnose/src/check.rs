//! The check contract.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

use mend_core::{IssueKind, Severity};

/// What a check is told about the endpoint under diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckContext {
    pub endpoint_id: String,
    pub url: String,
}

impl CheckContext {
    pub fn new(endpoint_id: &str, url: &str) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            url: url.to_string(),
        }
    }
}

/// Verdict of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub healthy: bool,
    pub description: String,
    /// `None` means the pipeline's default (medium).
    pub severity: Option<Severity>,
}

impl CheckOutcome {
    pub fn healthy(description: impl Into<String>) -> Self {
        Self {
            healthy: true,
            description: description.into(),
            severity: None,
        }
    }

    pub fn unhealthy(description: impl Into<String>, severity: Severity) -> Self {
        Self {
            healthy: false,
            description: description.into(),
            severity: Some(severity),
        }
    }
}

/// A check that could not reach a verdict.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl CheckError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Boxed future returned by [`DiagnosticCheck::run`].
pub type CheckFuture<'a> = Pin<Box<dyn Future<Output = Result<CheckOutcome, CheckError>> + Send + 'a>>;

/// One independent diagnostic check.
pub trait DiagnosticCheck: Send + Sync {
    /// The issue kind reported when this check fails.
    fn kind(&self) -> IssueKind;

    fn run<'a>(&'a self, ctx: &'a CheckContext) -> CheckFuture<'a>;
}
