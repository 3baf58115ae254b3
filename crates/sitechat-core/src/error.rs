use thiserror::Error;

/// Failure of a single request/response exchange with the chat endpoint.
///
/// Every variant ends the turn with the fixed apology message in the
/// assistant slot. None of them are retried.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The endpoint answered with a non-success status.
    #[error("chat endpoint returned status {0}")]
    Status(u16),

    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The body stream broke after the response started.
    #[error("stream read error: {0}")]
    Read(String),
}

/// Failure reading or writing the durable identity store.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not determine data directory")]
    NoDataDir,
}
