//! Errors surfaced by `TokenManager`

/// Errors returned to callers of the token manager.
///
/// Persistence failures never appear here; they are logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<oauth_auth::Error> for Error {
    fn from(err: oauth_auth::Error) -> Self {
        match err {
            oauth_auth::Error::Config(msg) => Error::Configuration(msg),
            oauth_auth::Error::Network(msg) => Error::Network(msg),
            oauth_auth::Error::Http { status, body } => Error::Http { status, body },
            oauth_auth::Error::MalformedResponse(msg) => Error::MalformedResponse(msg),
            oauth_auth::Error::Persistence(msg) => Error::Internal(msg),
        }
    }
}
