//! Error types for the post loop

use thiserror::Error;

/// Failure reported by a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response (connection, timeout, TLS, ...)
    #[error("request failed: {0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },
    /// The request url could not be built
    #[error("invalid request url: {0}")]
    Url(String),
    /// The response body was not the expected JSON shape
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => FetchError::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected loop configuration; raised before any fetch is attempted
    #[error("invalid loop configuration: {0}")]
    Configuration(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("render failed: {0}")]
    Render(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
