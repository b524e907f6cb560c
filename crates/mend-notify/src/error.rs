use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("http client: {0}")]
    Client(String),

    #[error("delivery failed: {0}")]
    Request(String),

    #[error("sink answered {status}")]
    Status { status: u16 },
}

pub type NotifyResult<T> = Result<T, NotifyError>;
