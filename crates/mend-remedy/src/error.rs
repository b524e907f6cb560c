use std::path::PathBuf;

use thiserror::Error;

/// Why a remediation action did not succeed.
#[derive(Debug, Error)]
pub enum RemedyError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited non-zero. `stderr` is kept as output.
    #[error("exit status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exit { code: Option<i32>, stderr: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no scaffold configured for {0}")]
    NoScaffold(String),
}

impl RemedyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RemedyError::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostic output worth keeping alongside the error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            RemedyError::Exit { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

pub type RemedyResult<T> = Result<T, RemedyError>;
