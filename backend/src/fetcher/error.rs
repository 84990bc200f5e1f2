//! Error types for remote image fetches

use thiserror::Error;

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Network-level failures while fetching a remote image
///
/// A completed HTTP exchange is never an error, whatever its status code.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The URL could not be parsed or is not an http(s) URL
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    /// The request did not complete within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// DNS, connection or TLS failure
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Any other transport failure
    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidUrl(error.to_string())
        } else if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Body(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for FetchError {
    fn from(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => Self::Request(err.to_string()),
        }
    }
}
