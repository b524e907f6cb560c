//! Shared types used across mend crates.
//!
//! These describe one pass of the control loop: an [`Endpoint`] goes
//! unhealthy, a [`Diagnosis`] lists its [`Issue`]s, each issue gets a
//! [`FixResult`], and the whole cycle is sealed into a [`FixReport`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored endpoint (the key in `[endpoints]`).
pub type EndpointId = String;

// ── Endpoint ───────────────────────────────────────────────────────

/// A monitored endpoint and its health counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub id: EndpointId,
    pub url: String,
    pub healthy: bool,
    /// Epoch millis of the last health check, if any.
    pub last_checked_at: Option<u64>,
    pub check_count: u64,
    pub fix_count: u64,
}

impl Endpoint {
    /// A freshly configured endpoint. Starts healthy until proven otherwise.
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            healthy: true,
            last_checked_at: None,
            check_count: 0,
            fix_count: 0,
        }
    }
}

// ── Issues ─────────────────────────────────────────────────────────

/// Severity of a diagnosed issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

/// Classification of an issue. Determines which remediation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueKind {
    Connectivity,
    BuildStatus,
    Dependencies,
    Configuration,
    Routing,
    Components,
    /// Produced by a check outside the built-in set.
    Custom(String),
}

impl IssueKind {
    pub fn as_str(&self) -> &str {
        match self {
            IssueKind::Connectivity => "connectivity",
            IssueKind::BuildStatus => "build_status",
            IssueKind::Dependencies => "dependencies",
            IssueKind::Configuration => "configuration",
            IssueKind::Routing => "routing",
            IssueKind::Components => "components",
            IssueKind::Custom(name) => name,
        }
    }
}

impl From<&str> for IssueKind {
    fn from(s: &str) -> Self {
        match s {
            "connectivity" => IssueKind::Connectivity,
            "build_status" => IssueKind::BuildStatus,
            "dependencies" => IssueKind::Dependencies,
            "configuration" => IssueKind::Configuration,
            "routing" => IssueKind::Routing,
            "components" => IssueKind::Components,
            other => IssueKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for IssueKind {
    fn from(s: String) -> Self {
        IssueKind::from(s.as_str())
    }
}

impl From<IssueKind> for String {
    fn from(kind: IssueKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified problem found by one diagnostic check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub description: String,
    pub severity: Severity,
}

/// All issues found for one unhealthy endpoint in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub endpoint_id: EndpointId,
    pub timestamp: u64,
    /// Ordered as the checks ran.
    pub issues: Vec<Issue>,
}

impl Diagnosis {
    pub fn new(endpoint_id: &str) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            timestamp: epoch_millis(),
            issues: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

// ── Fixes ──────────────────────────────────────────────────────────

/// Outcome of one remediation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub issue_kind: IssueKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl FixResult {
    pub fn succeeded(issue_kind: IssueKind, output: impl Into<String>) -> Self {
        Self {
            issue_kind,
            success: true,
            error: None,
            output: Some(output.into()),
        }
    }

    pub fn failed(issue_kind: IssueKind, error: impl Into<String>) -> Self {
        Self {
            issue_kind,
            success: false,
            error: Some(error.into()),
            output: None,
        }
    }

    /// Attach captured output to a failed result.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Outcome of the post-remediation health re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub timestamp: u64,
}

/// Audit record of one full diagnose → fix → verify cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixReport {
    pub endpoint_id: EndpointId,
    pub url: String,
    pub timestamp: u64,
    pub diagnosis: Diagnosis,
    /// One entry per `diagnosis.issues`, same order.
    pub fix_results: Vec<FixResult>,
    pub verification: VerificationResult,
    pub overall_success: bool,
}

impl FixReport {
    pub fn new(
        endpoint: &Endpoint,
        diagnosis: Diagnosis,
        fix_results: Vec<FixResult>,
        verification: VerificationResult,
    ) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            url: endpoint.url.clone(),
            timestamp: epoch_millis(),
            diagnosis,
            fix_results,
            overall_success: verification.success,
            verification,
        }
    }

    pub fn successful_fixes(&self) -> usize {
        self.fix_results.iter().filter(|f| f.success).count()
    }
}

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
