//! Upload orchestration: fetch, store, register

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    fetcher::ImageFetcher,
    media_storage::ObjectStore,
    naming::derive_filename,
    serving_url::{ServingUrl, ServingUrlGenerator},
    types::UploadError,
};

/// Key reported when the serving subsystem could not register the image
pub const GENERIC_FAILURE_KEY: &str = "error: Generic";

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Blob key, or [`GENERIC_FAILURE_KEY`] when degraded
    pub key: String,
    /// Source URL as passed by the caller
    pub original: String,
    /// Serving URL, or the failure reason when degraded
    pub resize_url: String,
    /// Store path of the written object
    pub location: String,
    /// The object is stored but no serving URL could be produced
    pub degraded: bool,
}

/// Sequences fetch, store and serving URL registration for one request
pub struct Uploader {
    fetcher: Arc<dyn ImageFetcher>,
    store: Arc<dyn ObjectStore>,
    serving: Arc<dyn ServingUrlGenerator>,
}

impl Uploader {
    /// Creates an uploader from its collaborators
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        store: Arc<dyn ObjectStore>,
        serving: Arc<dyn ServingUrlGenerator>,
    ) -> Self {
        Self {
            fetcher,
            store,
            serving,
        }
    }

    /// Mirrors the image at `url` into object storage
    ///
    /// Only a 200 from the source server leads to a write. A serving URL
    /// failure does not fail the upload: the object is already stored, so the
    /// result is returned with `degraded` set.
    ///
    /// # Errors
    ///
    /// - `UploadError::MissingUrl` if no URL was passed
    /// - `UploadError::InvalidUrl` if the URL cannot be fetched at all
    /// - `UploadError::UpstreamStatus` if the source server answers with anything but 200
    /// - `UploadError::Storage` if the write fails after retries
    #[instrument(skip(self))]
    pub async fn upload(&self, url: Option<String>) -> Result<StoredImage, UploadError> {
        let url = url.ok_or(UploadError::MissingUrl)?;

        let fetched = match self.fetcher.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(source) => return Err(UploadError::InvalidUrl { url, source }),
        };

        if fetched.status != 200 {
            return Err(UploadError::UpstreamStatus {
                status: fetched.status,
                url,
            });
        }

        let filename = derive_filename(&url);
        let location = self
            .store
            .put(&filename.name, &fetched.bytes, filename.content_type)
            .await?;

        match self.serving.serving_url(&location).await {
            ServingUrl::Success { key, url: resize_url } => {
                info!(location = %location, "Image stored and registered");
                Ok(StoredImage {
                    key,
                    original: url,
                    resize_url,
                    location,
                    degraded: false,
                })
            }
            ServingUrl::Failure { reason } => {
                warn!(location = %location, reason = %reason, "Image stored without serving URL");
                Ok(StoredImage {
                    key: GENERIC_FAILURE_KEY.to_string(),
                    original: url,
                    resize_url: reason,
                    location,
                    degraded: true,
                })
            }
        }
    }
}
