//! Remote image fetching over HTTP

mod error;

use std::time::Duration;

use reqwest::{Client, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use tracing::{debug, instrument};

pub use error::{FetchError, FetchResult};

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Maximum number of idle connections to maintain per host
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// Outcome of a completed HTTP exchange with the image host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    /// HTTP status code returned by the remote server
    pub status: u16,
    /// Raw response body
    pub bytes: Vec<u8>,
}

/// Downloads source images
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Issues a GET for `url`
    ///
    /// Non-2xx responses are returned as data, only network-level failures
    /// are errors.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedImage>;
}

/// HTTP implementation of [`ImageFetcher`]
pub struct HttpImageFetcher {
    http_client: ClientWithMiddleware,
}

impl HttpImageFetcher {
    /// Creates a new fetcher with a pooled, traced HTTP client
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Request` if the HTTP client fails to be created
    pub fn new() -> FetchResult<Self> {
        let reqwest_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .user_agent(format!("image-webhook/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Request(format!("Failed to create HTTP client: {e}")))?;

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self { http_client })
    }
}

/// Parses `url`, accepting only http and https
fn parse_image_url(url: &str) -> FetchResult<Url> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetchError::InvalidUrl(format!(
            "{url}: unsupported scheme {scheme}"
        ))),
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> FetchResult<FetchedImage> {
        let parsed = parse_image_url(url)?;

        let response = self.http_client.get(parsed).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?.to_vec();

        debug!(status, size = bytes.len(), "Fetched remote image");

        Ok(FetchedImage { status, bytes })
    }
}

/// Canned fetchers for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{FetchError, FetchResult, FetchedImage, ImageFetcher};

    /// Canned fetcher for tests
    pub struct MockImageFetcher {
        response: Result<FetchedImage, String>,
        calls: AtomicUsize,
    }

    impl MockImageFetcher {
        /// Responds to every fetch with `status` and `bytes`
        #[must_use]
        pub const fn responding(status: u16, bytes: Vec<u8>) -> Self {
            Self {
                response: Ok(FetchedImage { status, bytes }),
                calls: AtomicUsize::new(0),
            }
        }

        /// Fails every fetch with a connection error carrying `message`
        #[must_use]
        pub fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        /// Number of fetches performed so far
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageFetcher for MockImageFetcher {
        async fn fetch(&self, _url: &str) -> FetchResult<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().map_err(FetchError::Connect)
        }
    }
}
