//! Error types for object storage operations

use aws_sdk_s3::{
    error::{ProvideErrorMetadata, SdkError},
    operation::put_object::PutObjectError,
};
use thiserror::Error;

use super::retry::DeadlineExceeded;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while writing objects
#[derive(Error, Debug)]
pub enum StorageError {
    /// S3 service error
    #[error("S3 service error: {0}")]
    S3Error(String),

    /// AWS SDK error
    #[error("AWS SDK error: {0}")]
    AwsError(String),

    /// Upstream service error (5xx from S3) that outlived the retry budget
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The write, retries included, ran past its deadline
    #[error("Write deadline exceeded: {0}")]
    DeadlineExceeded(#[from] DeadlineExceeded),
}

/// `<code>: <message>` as reported by S3, falling back to the error's own text
fn service_error_text(error: &PutObjectError) -> String {
    match (error.code(), error.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => error.to_string(),
    }
}

impl From<SdkError<PutObjectError>> for StorageError {
    fn from(error: SdkError<PutObjectError>) -> Self {
        match &error {
            SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() >= 500 => {
                Self::UpstreamError(service_error_text(service_err.err()))
            }
            SdkError::ServiceError(service_err) => {
                Self::S3Error(service_error_text(service_err.err()))
            }
            _ => Self::AwsError(error.to_string()),
        }
    }
}
