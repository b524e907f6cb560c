//! mend-core — shared types and configuration for the mend workspace.
//!
//! Every other crate depends on this one for the vocabulary of the
//! control loop (endpoints, issues, diagnoses, fix reports) and for the
//! parsed `mend.toml`.

pub mod config;
pub mod task;
pub mod types;

pub use config::{ConfigError, MendConfig, parse_duration};
pub use types::*;
