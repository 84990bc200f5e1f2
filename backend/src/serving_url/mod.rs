//! Serving URL registration for stored images
//!
//! A stored object is identified towards the image serving subsystem by a
//! blob key derived from its store path. The subsystem answers with a public
//! URL that serves (and resizes) the image without exposing the bucket.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::media_storage::STORE_PATH_PREFIX;

/// Prefix of blob keys that point into object storage
pub const GS_KEY_PREFIX: &str = "encoded_gs_file:";

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Maximum number of idle connections to maintain per host
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// Outcome of a serving URL request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServingUrl {
    /// The image is registered and publicly served
    Success {
        /// Blob key of the stored object
        key: String,
        /// Public serving URL
        url: String,
    },
    /// The serving subsystem could not produce a URL
    Failure {
        /// Human-readable cause
        reason: String,
    },
}

/// Produces public serving URLs for stored objects
#[async_trait::async_trait]
pub trait ServingUrlGenerator: Send + Sync {
    /// Registers the object at `store_path` and returns its serving URL
    ///
    /// Never fails outright: problems are reported as [`ServingUrl::Failure`].
    async fn serving_url(&self, store_path: &str) -> ServingUrl;
}

/// Derives the blob key for a `/gs/<bucket>/<object>` store path
///
/// Returns `None` when the path does not point into object storage.
#[must_use]
pub fn blob_key(store_path: &str) -> Option<String> {
    let object = store_path
        .strip_prefix(STORE_PATH_PREFIX)?
        .strip_prefix('/')
        .filter(|object| !object.is_empty())?;

    Some(format!("{GS_KEY_PREFIX}{}", URL_SAFE.encode(object)))
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    blob_key: &'a str,
    secure_url: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    serving_url: String,
}

#[derive(Debug, Error)]
enum RegisterError {
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Image serving request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("Image serving subsystem returned {0}")]
    Status(u16),
    #[error("Invalid image serving response: {0}")]
    Decode(#[from] reqwest::Error),
}

/// HTTP client for the image serving subsystem
pub struct ImageServingClient {
    endpoint: String,
    http_client: ClientWithMiddleware,
}

impl ImageServingClient {
    /// Creates a client for the serving subsystem at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to be created
    pub fn new(endpoint: &str) -> reqwest::Result<Self> {
        let reqwest_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()?;

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn register(&self, key: &str) -> Result<String, RegisterError> {
        let url = format!("{}/v1/serving-urls", self.endpoint);
        let body = serde_json::to_vec(&RegisterRequest {
            blob_key: key,
            secure_url: true,
        })?;

        let response = self
            .http_client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RegisterError::Status(response.status().as_u16()));
        }

        let registered = response.json::<RegisterResponse>().await?;
        Ok(registered.serving_url)
    }
}

#[async_trait::async_trait]
impl ServingUrlGenerator for ImageServingClient {
    #[instrument(skip(self))]
    async fn serving_url(&self, store_path: &str) -> ServingUrl {
        let Some(key) = blob_key(store_path) else {
            return ServingUrl::Failure {
                reason: format!("{store_path} is not an object storage path"),
            };
        };

        match self.register(&key).await {
            Ok(url) => ServingUrl::Success { key, url },
            Err(err) => {
                warn!(key = %key, error = %err, "Serving URL registration failed");
                ServingUrl::Failure {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Canned serving URL generators for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::{blob_key, ServingUrl, ServingUrlGenerator};

    /// Serving URL generator with a canned outcome
    pub struct MockServingUrlGenerator {
        failure: Option<String>,
    }

    impl MockServingUrlGenerator {
        /// Generator that registers every path under `https://serving.test`
        #[must_use]
        pub const fn new() -> Self {
            Self { failure: None }
        }

        /// Generator that fails every registration with `reason`
        #[must_use]
        pub fn failing(reason: &str) -> Self {
            Self {
                failure: Some(reason.to_string()),
            }
        }
    }

    impl Default for MockServingUrlGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl ServingUrlGenerator for MockServingUrlGenerator {
        async fn serving_url(&self, store_path: &str) -> ServingUrl {
            if let Some(reason) = &self.failure {
                return ServingUrl::Failure {
                    reason: reason.clone(),
                };
            }

            let key = blob_key(store_path).unwrap_or_else(|| store_path.to_string());
            let url = format!("https://serving.test/{key}");
            ServingUrl::Success { key, url }
        }
    }
}
