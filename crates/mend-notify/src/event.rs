//! Notification payloads.
//!
//! An event is a flat JSON object carrying at least `event` and
//! `timestamp`. Keys serialize in sorted order, so identical events
//! produce identical bytes (and identical signatures).

use serde::Serialize;
use serde_json::{Map, Value, json};

use mend_core::{FixReport, epoch_millis};

/// Every event the daemon emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    EndpointFixReport,
    EndpointFixError,
    HealthSummary,
    HealthWarning,
    ProcessStartup,
    ProcessShutdown,
    ProcessCrash,
    IterationError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::EndpointFixReport => "endpoint_fix_report",
            EventKind::EndpointFixError => "endpoint_fix_error",
            EventKind::HealthSummary => "health_summary",
            EventKind::HealthWarning => "health_warning",
            EventKind::ProcessStartup => "process_startup",
            EventKind::ProcessShutdown => "process_shutdown",
            EventKind::ProcessCrash => "process_crash",
            EventKind::IterationError => "iteration_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// A bare event stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self::at(kind, epoch_millis())
    }

    pub fn at(kind: EventKind, timestamp: u64) -> Self {
        let mut fields = Map::new();
        fields.insert("event".to_string(), Value::from(kind.as_str()));
        fields.insert("timestamp".to_string(), Value::from(timestamp));
        Event(fields)
    }

    /// Add (or replace) a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The outcome of one remediation cycle.
    pub fn fix_report(report: &FixReport) -> Self {
        let status = if report.overall_success { "fixed" } else { "failed" };
        let issues: Vec<Value> = report
            .diagnosis
            .issues
            .iter()
            .map(|i| json!({ "kind": i.kind.as_str(), "severity": i.severity, "description": i.description }))
            .collect();
        Event::at(EventKind::EndpointFixReport, report.timestamp)
            .with("endpoint", report.endpoint_id.as_str())
            .with("url", report.url.as_str())
            .with("status", status)
            .with("issues", report.diagnosis.issues.len())
            .with("issue_details", issues)
            .with("fixes_applied", report.fix_results.len())
            .with("successful_fixes", report.successful_fixes())
    }

    /// A remediation cycle that faulted before producing a report.
    pub fn fix_error(endpoint_id: &str, error: &str) -> Self {
        Event::new(EventKind::EndpointFixError)
            .with("endpoint", endpoint_id)
            .with("error", error)
    }

    pub fn name(&self) -> &str {
        self.0.get("event").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn timestamp(&self) -> u64 {
        self.0.get("timestamp").and_then(Value::as_u64).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is(&self, kind: EventKind) -> bool {
        self.name() == kind.as_str()
    }

    /// Canonical JSON body.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
    }
}
