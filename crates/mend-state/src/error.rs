//! Errors raised by the report log.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open report log: {0}")]
    Open(String),

    #[error("report log transaction: {0}")]
    Transaction(String),

    #[error("report table: {0}")]
    Table(String),

    #[error("reading report log: {0}")]
    Read(String),

    #[error("appending report: {0}")]
    Write(String),

    #[error("encoding report: {0}")]
    Encode(String),

    /// A stored entry no longer decodes as a report.
    #[error("report #{seq} is corrupt: {reason}")]
    Corrupt { seq: u64, reason: String },
}
