//! Upload failures and their HTTP representation

use aide::OperationOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Serialize;
use thiserror::Error;

use crate::{fetcher::FetchError, media_storage::StorageError};

/// Message returned when the source URL cannot be fetched at all
pub const INVALID_URL_MESSAGE: &str = "The passed image url was invalid.";

/// Message returned when the request carries no image url
pub const MISSING_URL_MESSAGE: &str = "No image url was passed.";

/// Message returned when the source server answers with a non-200 status
pub const UPSTREAM_FAILURE_MESSAGE: &str = "An error was encountered downloading the passed url.";

/// JSON body sent for every failed upload
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// HTTP status code of the response
    pub error: u16,
    /// Human-readable error message
    pub message: String,
    /// Source URL, set when the source server rejected the download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    /// Source URL, set when it could not be fetched at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Every way an upload request can fail
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request carried no `url` field
    #[error("{}", MISSING_URL_MESSAGE)]
    MissingUrl,

    /// The request body could not be read
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The source URL failed at the network level
    #[error("{}", INVALID_URL_MESSAGE)]
    InvalidUrl {
        /// Source URL as passed by the caller
        url: String,
        /// Underlying fetch failure
        #[source]
        source: FetchError,
    },

    /// The source server answered with a status other than 200
    #[error("{}", UPSTREAM_FAILURE_MESSAGE)]
    UpstreamStatus {
        /// Status returned by the source server
        status: u16,
        /// Source URL as passed by the caller
        url: String,
    },

    /// The image could not be written to object storage
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// HTTP status this error is reported with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::MissingUrl
            | Self::InvalidRequest(_)
            | Self::InvalidUrl { .. }
            | Self::Storage(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON body this error is reported with
    #[must_use]
    pub fn body(&self) -> ErrorResponse {
        let (request_url, url) = match self {
            Self::UpstreamStatus { url, .. } => (Some(url.clone()), None),
            Self::InvalidUrl { url, .. } => (None, Some(url.clone())),
            Self::MissingUrl | Self::InvalidRequest(_) | Self::Storage(_) => (None, None),
        };

        ErrorResponse {
            success: false,
            error: self.status().as_u16(),
            message: self.to_string(),
            request_url,
            url,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(err) => tracing::error!("Storage error: {err}"),
            Self::InvalidUrl { url, source } => {
                tracing::warn!("Failed to fetch {url}: {source}");
            }
            Self::UpstreamStatus { status, url } => {
                tracing::warn!("Source server returned {status} for {url}");
            }
            Self::MissingUrl | Self::InvalidRequest(_) => {
                tracing::warn!("Client error: {self}");
            }
        }

        (self.status(), Json(self.body())).into_response()
    }
}

impl OperationOutput for UploadError {
    type Inner = ErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ErrorResponse>::operation_response(ctx, operation)
    }
}
