//! mend-remedy — repair what the diagnostic pipeline found.
//!
//! # Architecture
//!
//! ```text
//! RemediationDispatcher
//!   ├── remediate(diagnosis) → Vec<FixResult>   (one per issue, in order)
//!   └── apply(issue)
//!         ├── action_for(kind) → RemediationAction
//!         │     build_status   → Build            (build_command)
//!         │     dependencies   → Install          (install_command)
//!         │     configuration  → WriteScaffolds   (missing files only)
//!         │     routing        → WriteScaffolds   (overwrite)
//!         │     components     → WriteScaffolds   (missing files only)
//!         │     everything else → Restart         (restart_command)
//!         └── spawned task + timeout(fix_timeout)
//! ```
//!
//! Commands run through `sh -c` in the project root, each in its own
//! process group. An expired action takes every process it started down
//! with it.

pub mod action;
pub mod dispatcher;
pub mod error;
mod group;

pub use action::{RemediationAction, action_for, run_shell};
pub use dispatcher::RemediationDispatcher;
pub use error::{RemedyError, RemedyResult};
