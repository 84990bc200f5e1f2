//! S3-based image storage operations
mod error;
mod retry;

use std::sync::Arc;

use aws_sdk_s3::{
    error::SdkError, operation::put_object::PutObjectError, primitives::ByteStream,
    Client as S3Client,
};
use tracing::{info, instrument};

pub use error::{StorageError, StorageResult};
pub use retry::{DeadlineExceeded, WriteRetryPolicy};

/// Protocol marker prefixed to store paths handed to the serving layer
pub const STORE_PATH_PREFIX: &str = "/gs";

/// Durable object storage for fetched images
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` under `filename` and returns the store path
    /// (`/gs/<bucket>/<filename>`)
    async fn put(&self, filename: &str, bytes: &[u8], content_type: &str)
        -> StorageResult<String>;
}

/// Builds the store path for an object in `bucket`
#[must_use]
pub fn store_path(bucket: &str, filename: &str) -> String {
    format!("{STORE_PATH_PREFIX}/{bucket}/{filename}")
}

/// Whether a failed put is worth another attempt
fn is_transient(error: &SdkError<PutObjectError>) -> bool {
    match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            status == 408 || status == 429 || status >= 500
        }
        _ => false,
    }
}

/// Image storage client for S3 operations
pub struct MediaStorage {
    s3_client: Arc<S3Client>,
    bucket_name: String,
    retry_policy: WriteRetryPolicy,
}

impl MediaStorage {
    /// Creates a new media storage client
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    /// * `bucket_name` - Bucket images are written to, resolved at start-up
    /// * `retry_policy` - Backoff applied to every write
    #[must_use]
    pub const fn new(
        s3_client: Arc<S3Client>,
        bucket_name: String,
        retry_policy: WriteRetryPolicy,
    ) -> Self {
        Self {
            s3_client,
            bucket_name,
            retry_policy,
        }
    }

    /// Bucket this client writes to
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}

#[async_trait::async_trait]
impl ObjectStore for MediaStorage {
    /// Writes the object with the configured retry policy
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` for an empty object name
    /// Returns `StorageError::UpstreamError` for 5xx errors that outlive the retry budget
    /// Returns `StorageError::S3Error` for other S3 service errors
    /// Returns `StorageError::AwsError` for transport failures
    /// Returns `StorageError::DeadlineExceeded` when the retry deadline passes
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket_name, size = bytes.len()))]
    async fn put(
        &self,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> StorageResult<String> {
        if filename.is_empty() {
            return Err(StorageError::InvalidInput(
                "object name must not be empty".to_string(),
            ));
        }

        let client = &self.s3_client;
        let bucket = self.bucket_name.as_str();

        self.retry_policy
            .run(
                move || async move {
                    client
                        .put_object()
                        .bucket(bucket)
                        .key(filename)
                        .content_type(content_type)
                        .body(ByteStream::from(bytes.to_vec()))
                        .send()
                        .await
                },
                is_transient,
            )
            .await?;

        let path = store_path(&self.bucket_name, filename);
        info!(path = %path, "Stored image");

        Ok(path)
    }
}

/// In-memory store for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::Mutex;

    use super::{store_path, ObjectStore, StorageError, StorageResult};

    /// Object captured by [`MockObjectStore`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredObject {
        /// Object name
        pub filename: String,
        /// Object content
        pub bytes: Vec<u8>,
        /// Content type label
        pub content_type: String,
    }

    /// In-memory object store for tests
    pub struct MockObjectStore {
        bucket_name: String,
        failure: Option<String>,
        objects: Mutex<Vec<StoredObject>>,
    }

    impl MockObjectStore {
        /// Store that accepts every write
        #[must_use]
        pub fn new(bucket_name: &str) -> Self {
            Self {
                bucket_name: bucket_name.to_string(),
                failure: None,
                objects: Mutex::new(Vec::new()),
            }
        }

        /// Store whose writes always fail as if retries were exhausted
        #[must_use]
        pub fn failing(bucket_name: &str, message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::new(bucket_name)
            }
        }

        /// Objects written so far
        ///
        /// # Panics
        ///
        /// Panics if the lock is poisoned
        #[must_use]
        pub fn objects(&self) -> Vec<StoredObject> {
            self.objects.lock().expect("mock store lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl ObjectStore for MockObjectStore {
        async fn put(
            &self,
            filename: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> StorageResult<String> {
            if let Some(message) = &self.failure {
                return Err(StorageError::UpstreamError(message.clone()));
            }

            self.objects
                .lock()
                .expect("mock store lock")
                .push(StoredObject {
                    filename: filename.to_string(),
                    bytes: bytes.to_vec(),
                    content_type: content_type.to_string(),
                });

            Ok(store_path(&self.bucket_name, filename))
        }
    }
}
