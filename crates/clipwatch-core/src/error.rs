use thiserror::Error;

/// Errors from chat sources (line streams and IRC).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IRC authentication failed: {0}")]
    AuthFailed(String),

    #[error("failed to join {0}")]
    JoinFailed(String),

    #[error("connection closed by server")]
    Disconnected,
}

/// Errors from the VOD chat fetcher.
#[derive(Debug, Error)]
pub enum VodError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("video {0} not found")]
    VideoNotFound(u64),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("too many consecutive errors, last: {0}")]
    TooManyErrors(String),
}
