//! mend-agent — the self-healing control loop.
//!
//! # Architecture
//!
//! ```text
//! LoopController
//!   ├── main timer (interval, single-flight)
//!   │     └── JoinSet: one task per EndpointAgent
//!   │           └── check_health()
//!   │                 probe ─ok─▶ healthy
//!   │                   └─fail─▶ diagnose → remediate → settle → verify
//!   │                                 → FixReport (redb) → endpoint_fix_report
//!   │     └── health_summary
//!   └── summary timer (summary_interval, cached health only)
//!         └── health_warning
//! ```
//!
//! Agents share an [`AgentContext`]: the probe, the diagnostic pipeline,
//! the remediation dispatcher, the notifier and the [`SystemState`]
//! handle.
//!
//! [`SystemState`]: mend_state::SystemState

pub mod agent;
pub mod assemble;
pub mod controller;
pub mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{AgentContext, AgentPhase, EndpointAgent};
pub use assemble::assemble;
pub use controller::{IterationSummary, LoopController};
pub use error::{AgentError, AgentResult};
