//! Image upload endpoint

use std::sync::Arc;

use axum::{Extension, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    types::{ImageUrl, UploadError},
    uploader::{StoredImage, Uploader},
};

/// Source and serving URL of an uploaded image
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImageUrls {
    /// Source URL as passed by the caller
    pub original: String,
    /// Public, resizable serving URL
    pub resize_url: String,
}

/// JSON body of a successful upload
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UploadResponse {
    /// Blob key of the stored image, `"error: Generic"` when degraded
    pub key: String,
    /// Always `true`
    pub success: bool,
    /// Source and serving URLs
    pub urls: ImageUrls,
    /// Store path of the written object
    pub location: String,
    /// Set when the image was stored but could not be registered for serving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}

impl From<StoredImage> for UploadResponse {
    fn from(stored: StoredImage) -> Self {
        Self {
            key: stored.key,
            success: true,
            urls: ImageUrls {
                original: stored.original,
                resize_url: stored.resize_url,
            },
            location: stored.location,
            degraded: stored.degraded.then_some(true),
        }
    }
}

/// Mirrors a remote image into object storage
///
/// Called by the webhook source whenever an image is created. The body (or
/// query string) carries the image `url`:
/// 1. Downloads the image
/// 2. Writes it to the bucket under the name derived from the URL
/// 3. Registers the stored object with the image serving subsystem
///
/// # Errors
///
/// - 400 when the url is missing or cannot be fetched
/// - the source server's status when it answers with anything but 200
/// - 400 when the image cannot be written to storage
#[instrument(skip(uploader, url))]
pub async fn upload_image(
    Extension(uploader): Extension<Arc<Uploader>>,
    ImageUrl(url): ImageUrl,
) -> Result<Json<UploadResponse>, UploadError> {
    let stored = uploader.upload(url).await?;

    Ok(Json(UploadResponse::from(stored)))
}
