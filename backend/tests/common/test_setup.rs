use std::sync::Arc;

use aws_sdk_s3::{
    config::{retry::RetryConfig, BehaviorVersion, Credentials, Region},
    Client as S3Client,
};
use axum::{body::Body, http::Request, response::Response, Router};
use image_webhook::{
    fetcher::{mock::MockImageFetcher, ImageFetcher},
    media_storage::{mock::MockObjectStore, ObjectStore},
    server,
    serving_url::{mock::MockServingUrlGenerator, ServingUrlGenerator},
    types::Environment,
    uploader::Uploader,
};
use tower::ServiceExt;

/// Bucket used by every test store
pub const TEST_BUCKET: &str = "image-webhook-test";

/// Initialize tracing for tests
pub fn setup_test_env() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// S3 client pointed at a local endpoint with static credentials
///
/// SDK retries are off so every attempt comes from the write retry policy.
pub fn s3_client(endpoint: &str) -> Arc<S3Client> {
    let credentials = Credentials::new("test", "test", None, None, "image-webhook-tests");

    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(endpoint)
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();

    Arc::new(S3Client::from_conf(config))
}

/// Router wired to the given collaborators
pub struct TestSetup {
    pub router: Router,
    pub store: Arc<MockObjectStore>,
}

impl TestSetup {
    /// Setup with mock fetcher and serving generator
    pub fn new(fetcher: MockImageFetcher, store: MockObjectStore) -> Self {
        Self::with_collaborators(
            Arc::new(fetcher),
            store,
            Arc::new(MockServingUrlGenerator::new()),
        )
    }

    /// Setup with arbitrary fetcher and serving generator
    pub fn with_collaborators(
        fetcher: Arc<dyn ImageFetcher>,
        store: MockObjectStore,
        serving: Arc<dyn ServingUrlGenerator>,
    ) -> Self {
        setup_test_env();

        let store = Arc::new(store);
        let uploader = Arc::new(Uploader::new(
            fetcher,
            store.clone() as Arc<dyn ObjectStore>,
            serving,
        ));

        Self {
            router: server::router(Environment::Development, uploader),
            store,
        }
    }

    pub async fn send_post_request(
        &self,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/json")
            .body(Body::from(payload.to_string()))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_form_request(
        &self,
        route: &str,
        form: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_get_request(
        &self,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }
}
