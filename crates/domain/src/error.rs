/// Shared error type used across all Hermes crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The session identifier is unknown, malformed, or already cleaned up.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Caller input rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("upload: {0}")]
    Upload(String),

    #[error("a dispatch is already in progress for session {0}")]
    DispatchInProgress(String),

    /// Constructing or authenticating the messaging connection failed.
    #[error("upstream connection: {0}")]
    Upstream(String),

    /// Delivery to a single recipient failed.  Recorded, never propagated.
    #[error("send: {0}")]
    Send(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
