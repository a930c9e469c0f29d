//! Error types for repository operations.

use thiserror::Error;

/// Terminal failure of a repository operation.
///
/// Decoding failure is not represented here: a body that does not decode
/// produces a successful result carrying no asset.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The server answered outside 200..300, or did not answer at all
    /// (reported as 400).
    #[error("bad status code: {code}")]
    BadStatusCode { code: u16 },

    /// The transfer failed after a successful status line.
    #[error("transport failure: {cause}")]
    TransportFailure {
        #[source]
        cause: TransportError,
    },

    /// A cache read found no entry for the key.
    #[error("no cached entry for the requested URL")]
    CacheMiss,

    /// The worker task was torn down before it produced a result
    /// (runtime shutdown).
    #[error("operation interrupted before completion")]
    Interrupted,
}

impl ImageError {
    /// Returns true if this error is a cache miss.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheMiss)
    }

    /// Returns the HTTP status code for `BadStatusCode` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::BadStatusCode { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportError> for ImageError {
    fn from(cause: TransportError) -> Self {
        Self::TransportFailure { cause }
    }
}

/// Errors raised while moving bytes over the network.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response carried no body.
    #[error("response body is empty")]
    EmptyBody,

    #[error("connection error: {0}")]
    Connection(String),
}
