//! mend-diagnose — classify why an endpoint is unhealthy.
//!
//! # Architecture
//!
//! ```text
//! DiagnosticPipeline
//!   ├── checks: Vec<Arc<dyn DiagnosticCheck>>   (run in order, one at a time)
//!   │   ├── ConnectivityCheck      → connectivity
//!   │   ├── BuildArtifactCheck     → build_status
//!   │   ├── DependencyCheck        → dependencies
//!   │   ├── ConfigFilesCheck       → configuration
//!   │   ├── RoutingCheck           → routing
//!   │   └── ComponentsCheck        → components
//!   └── diagnose(ctx) → Diagnosis
//! ```
//!
//! Each check runs on its own task. An `Err` or a panic from a check
//! becomes a high-severity issue (`"Check failed: …"`) and the pipeline
//! moves on; nothing a check does can abort the diagnosis.

pub mod check;
pub mod connectivity;
pub mod pipeline;
pub mod project;

#[cfg(test)]
pub(crate) mod testutil;

pub use check::{CheckContext, CheckError, CheckFuture, CheckOutcome, DiagnosticCheck};
pub use connectivity::ConnectivityCheck;
pub use pipeline::DiagnosticPipeline;
pub use project::{BuildArtifactCheck, ComponentsCheck, ConfigFilesCheck, DependencyCheck, RoutingCheck};
