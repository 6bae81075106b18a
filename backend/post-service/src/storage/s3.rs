use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::ObjectStorage;
use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// Build an AWS S3 client from the provided configuration.
///
/// Falls back to the default credential chain when no explicit keys are
/// configured; supports endpoint override for S3-compatible storage (MinIO).
pub async fn build_s3_client(config: &StorageConfig) -> Result<Client> {
    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "post-service",
        );
        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    let shared_config = aws_config_builder.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
    if let Some(endpoint) = &config.endpoint {
        if !endpoint.trim().is_empty() {
            builder = builder.endpoint_url(endpoint);
        }
    }

    Ok(Client::from_conf(builder.build()))
}

/// S3-backed implementation of the object storage gateway.
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        let public_base_url = config
            .public_base_url
            .clone()
            .unwrap_or_else(|| {
                format!(
                    "https://{}.s3.{}.amazonaws.com",
                    config.bucket, config.region
                )
            })
            .trim_end_matches('/')
            .to_string();

        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        folder: &str,
        object_name: &str,
        tags: &[(String, String)],
    ) -> Result<String> {
        let key = format!("{}/{}", folder, object_name);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type);

        for (name, value) in tags {
            request = request.metadata(name.clone(), value.clone());
        }

        request.send().await.map_err(|e| {
            let error_msg = e.to_string();
            if error_msg.contains("403") || error_msg.contains("Forbidden") {
                AppError::Storage("S3 auth failed (403): check AWS credentials".to_string())
            } else if error_msg.contains("NoSuchBucket") {
                AppError::Storage(format!("S3 bucket not found: {}", self.bucket))
            } else {
                AppError::Storage(format!("S3 upload failed: {}", e))
            }
        })?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Health check for S3 connectivity and bucket access.
///
/// Attachment uploads depend entirely on the bucket being reachable, so this
/// runs at startup.
pub async fn health_check(client: &Client, bucket: &str) -> Result<()> {
    client
        .list_objects_v2()
        .bucket(bucket)
        .max_keys(1)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 health check failed for {bucket}: {e}")))?;

    tracing::info!("S3 connection validated (bucket: {})", bucket);
    Ok(())
}
