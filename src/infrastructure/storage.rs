use crate::config::GatewayConfig;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &GatewayConfig) -> Arc<S3ObjectStore> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {}, Region: {})",
        config.endpoint_url.as_deref().unwrap_or("aws"),
        config.bucket,
        config.region
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "static",
        ));
    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3ObjectStore::new(s3_client, config))
}
