use std::time::Duration;

/// Error types for the command/status exchange
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("No record at {0}")]
    Missing(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Invalid timestamp {0}")]
    InvalidTimestamp(f64),

    #[error("Record not updated since timestamp {0}")]
    Stale(f64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Mailbox did not answer within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
