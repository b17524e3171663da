use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AppConfig, S3Settings};

/// Buckets the dashboard may upload into.
pub const BUCKETS: [&str; 2] = ["post-images", "album-images"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("storage error: {0}")]
    Other(String),
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the object. Reports `Duplicate` when the key is already present.
    async fn put(&self, bucket: &str, key: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError>;
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Objects are addressed by content, `<sha256>.<ext>`.
pub fn object_key(hash: &str, extension: &str) -> String {
    format!("{hash}.{extension}")
}

/// S3-compatible client for the BaaS storage buckets.
pub struct S3MediaStore {
    client: aws_sdk_s3::Client,
    public_base: String,
}

impl S3MediaStore {
    pub async fn new(baas_url: &str, s3: &S3Settings) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let baas_url = baas_url.trim_end_matches('/');
        let endpoint = s3
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("{baas_url}/storage/v1/s3"));
        if s3.access_key.is_empty() || s3.secret_key.is_empty() {
            return Err(anyhow::anyhow!("S3_ACCESS_KEY / S3_SECRET_KEY must be set for uploads"));
        }
        let creds = Credentials::new(s3.access_key.clone(), s3.secret_key.clone(), None, None, "static");
        let conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(s3.region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(SharedCredentialsProvider::new(creds))
            .load()
            .await;
        // the storage gateway only understands path-style addressing
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!(%endpoint, "initialized object storage client");

        // startup must not hang on an unreachable storage endpoint
        for bucket in BUCKETS {
            match tokio::time::timeout(PROBE_TIMEOUT, client.head_bucket().bucket(bucket).send()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(bucket, error = ?e, "bucket not reachable; uploads into it will fail until it exists"),
                Err(_) => warn!(bucket, "bucket probe timed out"),
            }
        }

        Ok(Self {
            client,
            public_base: format!("{baas_url}/storage/v1/object/public"),
        })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, bucket: &str, key: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        if self.client.head_object().bucket(bucket).key(key).send().await.is_ok() {
            return Err(MediaStoreError::Duplicate);
        }
        let put = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(mime)
            .body(ByteStream::from(bytes.to_vec()));
        if let Err(e) = put.send().await {
            error!(bucket, key, error = ?e, "put_object failed");
            let text = e.to_string();
            let hint = if text.contains("NoSuchBucket") {
                " (bucket missing; create it in the BaaS dashboard)"
            } else if text.contains("AccessDenied") {
                " (check S3_ACCESS_KEY/S3_SECRET_KEY permissions)"
            } else {
                ""
            };
            return Err(MediaStoreError::Other(format!("{text}{hint}")));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.public_base)
    }
}

/// `None` when the BaaS is not configured or the client cannot be built; uploads then answer 503.
pub async fn build_media_store(cfg: &AppConfig) -> Option<Arc<dyn MediaStore>> {
    let baas = cfg.baas.as_ref()?;
    match S3MediaStore::new(&baas.url, &cfg.s3).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(error = %e, "object storage disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_hash_plus_extension() {
        assert_eq!(object_key("abc123", "png"), "abc123.png");
    }
}
