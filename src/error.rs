//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    /// A read or write against the durable store could not be executed or
    /// committed. Never retried.
    #[error("storage error: {0}")]
    Storage(String),

    /// Bootstrap could not produce a node identity. Fatal at startup.
    #[error("node identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Configured override credentials are present but unusable.
    #[error("invalid identity override: {0}")]
    InvalidOverride(String),

    /// The peer list start signal closed before bootstrap reached `Ready`.
    #[error("peer list error: {0}")]
    PeerList(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
