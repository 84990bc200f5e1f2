//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};

/// Application identity used when `APP_ID` is not set
const DEFAULT_APP_ID: &str = "image-webhook";

/// Image serving subsystem used during local development
const DEVELOPMENT_IMAGE_SERVING_URL: &str = "http://localhost:8080";

/// Limit for a single S3 request; several fit into the write deadline
const S3_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Application environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Stage name as accepted by `APP_ENV`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        }
    }

    /// Returns the bucket uploaded images are written to
    ///
    /// `BUCKET_NAME` wins when set, otherwise the platform default bucket
    /// for this application is used.
    #[must_use]
    pub fn bucket_name(&self) -> String {
        env::var("BUCKET_NAME")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.default_bucket_name())
    }

    /// Default bucket identity, derived from the application id
    #[must_use]
    pub fn default_bucket_name(&self) -> String {
        let app_id = env::var("APP_ID").unwrap_or_else(|_| DEFAULT_APP_ID.to_string());
        format!("{app_id}.appspot.com")
    }

    /// Base URL of the image serving subsystem
    ///
    /// # Panics
    ///
    /// Panics if `IMAGE_SERVING_URL` is not set outside of development
    #[must_use]
    pub fn image_serving_url(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("IMAGE_SERVING_URL")
                .expect("IMAGE_SERVING_URL environment variable is not set"),
            Self::Development => env::var("IMAGE_SERVING_URL")
                .unwrap_or_else(|_| DEVELOPMENT_IMAGE_SERVING_URL.to_string()),
        }
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Staging)
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration with per-request timeouts
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .operation_attempt_timeout(S3_ATTEMPT_TIMEOUT)
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS S3 service configuration
    ///
    /// SDK retries are disabled: object writes are retried by
    /// [`crate::media_storage::WriteRetryPolicy`] instead.
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        builder.set_retry_config(Some(RetryConfig::disabled()));

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self, Self::Development) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }
}
