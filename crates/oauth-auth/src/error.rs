//! Error taxonomy for token exchange and storage

/// Errors from credential validation, token exchange, and token storage.
///
/// Payloads are owned strings so one exchange outcome can be cloned out to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("token endpoint unreachable: {0}")]
    Network(String),

    #[error("token endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("token store error: {0}")]
    Persistence(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
