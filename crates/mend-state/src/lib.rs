//! mend-state — process-wide state for the mend control loop.
//!
//! Two layers:
//!
//! - [`ReportStore`]: an append-only log of [`FixReport`]s backed by
//!   [redb](https://docs.rs/redb). In-memory by default; on disk when a
//!   data directory is configured so the audit trail survives restarts.
//! - [`SystemState`]: the cloneable handle the loop controller owns and
//!   injects into every endpoint agent. Holds the aggregate counters, the
//!   latest endpoint snapshots, and the single-flight iteration guard.
//!
//! All mutations are increments, appends, or snapshot replacement by the
//! owning agent, so atomics and short-lived locks are enough.
//!
//! [`FixReport`]: mend_core::FixReport

pub mod error;
pub mod store;
pub mod system;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::ReportStore;
pub use system::{Counters, IterationGuard, SystemState};
