use crate::config::UploadConfig;
use crate::services::storage::S3ObjectStore;
use anyhow::{Context, Result};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

const DEFAULT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";

pub async fn setup_object_store(config: &UploadConfig) -> Result<Arc<S3ObjectStore>> {
    let settings = &config.object_store;
    let bucket = config.bucket_name.clone();
    anyhow::ensure!(!bucket.is_empty(), "BUCKET_NAME must be set for cloud uploads");

    let mut loader = aws_config::from_env().region(Region::new(settings.region.clone()));

    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    // Custom endpoints (MinIO and friends) only understand path-style addressing
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(settings.endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    let endpoint = settings
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_S3_ENDPOINT.to_string());

    info!("☁️  Object Storage: {} (Bucket: {})", endpoint, bucket);

    s3_client
        .head_bucket()
        .bucket(&bucket)
        .send()
        .await
        .with_context(|| format!("Bucket '{}' is not reachable", bucket))?;
    info!("✅ Bucket '{}' is ready", bucket);

    Ok(Arc::new(S3ObjectStore::new(s3_client, bucket, endpoint)))
}
