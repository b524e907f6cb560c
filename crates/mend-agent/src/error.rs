use thiserror::Error;

use mend_core::ConfigError;
use mend_probe::TransportError;
use mend_state::StateError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("state: {0}")]
    State(#[from] StateError),

    #[error("cycle panicked: {0}")]
    Panicked(String),

    #[error("controller fault: {0}")]
    Controller(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
