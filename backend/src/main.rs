use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use image_webhook::{
    fetcher::HttpImageFetcher,
    media_storage::{MediaStorage, WriteRetryPolicy},
    server,
    serving_url::ImageServingClient,
    types::Environment,
    uploader::Uploader,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    // JSON logs for staging/production, human-readable for development
    if environment.json_logs() {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }

    let s3_client = Arc::new(S3Client::from_conf(environment.s3_client_config().await));
    let media_storage = Arc::new(MediaStorage::new(
        s3_client,
        environment.bucket_name(),
        WriteRetryPolicy::default(),
    ));
    tracing::info!("Writing images to bucket {}", media_storage.bucket_name());

    let fetcher = Arc::new(HttpImageFetcher::new()?);
    let serving = Arc::new(ImageServingClient::new(&environment.image_serving_url())?);

    let uploader = Arc::new(Uploader::new(fetcher, media_storage, serving));

    server::start(environment, uploader).await
}
