use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::errors::OffloadError;
use crate::stores::BlobStore;

/// S3-backed blob store for offloaded payloads.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
    region: String,
}

impl S3BlobStore {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        let region = config.region().map(ToString::to_string).unwrap_or_default();
        Self::from_client(S3Client::new(config), region)
    }

    #[must_use]
    pub fn from_client(client: S3Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub async fn from_env() -> Self {
        Self::new(&super::load_config().await)
    }
}

fn location(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn region(&self) -> &str {
        &self.region
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OffloadError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(HeadBucketError::is_not_found) => Ok(false),
            Err(e) => Err(OffloadError::upstream("check bucket", format!("s3://{bucket}"), e)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OffloadError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| OffloadError::upstream("upload object", location(bucket, key), e))?;
        debug!(bucket, key, size, "uploaded object");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OffloadError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                return Err(OffloadError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(e) => {
                return Err(OffloadError::upstream("download object", location(bucket, key), e));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| OffloadError::upstream("read object", location(bucket, key), e))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), OffloadError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| OffloadError::upstream("delete object", location(bucket, key), e))?;
        Ok(())
    }
}
