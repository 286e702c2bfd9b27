#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use queue_offload::errors::OffloadError;
use queue_offload::stores::memory::MemoryError;
use queue_offload::messages::Message;
use queue_offload::stores::{
    BlobStore, MemoryBlobStore, MemoryQueue, QueueService, ReceiveRequest, ReceivedMessage,
    SendOutput,
};
use queue_offload::{OffloadConfig, OffloadQueueClient};

pub const REGION: &str = "us-west-2";
pub const BUCKET: &str = "offload-bucket";
pub const QUEUE_URL: &str = "https://sqs.us-west-2.amazonaws.com/123456789012/orders";
pub const TOPIC_ARN: &str = "arn:aws:sns:us-west-2:123456789012:events";

pub fn blob_store() -> Arc<MemoryBlobStore> {
    Arc::new(MemoryBlobStore::new(REGION).with_bucket(BUCKET))
}

pub type MemoryClient = OffloadQueueClient<Arc<MemoryQueue>, Arc<MemoryBlobStore>>;

pub async fn queue_client(
    config: OffloadConfig,
) -> (MemoryClient, Arc<MemoryQueue>, Arc<MemoryBlobStore>) {
    let queue = Arc::new(MemoryQueue::new());
    let blobs = blob_store();
    let client = OffloadQueueClient::new(Arc::clone(&queue), Arc::clone(&blobs), config)
        .await
        .expect("client should connect");
    (client, queue, blobs)
}

/// Client over arbitrary collaborators with the default configuration.
pub async fn connect<Q, B>(queue: Q, blobs: B) -> OffloadQueueClient<Q, B>
where
    Q: QueueService,
    B: BlobStore,
{
    OffloadQueueClient::new(queue, blobs, OffloadConfig::new(BUCKET))
        .await
        .expect("client should connect")
}

/// One byte over the provider limit.
pub fn large_body() -> String {
    "a".repeat(262_145)
}

/// Blob store whose writes and deletes can be made to fail.
pub struct FlakyBlobStore {
    pub inner: Arc<MemoryBlobStore>,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyBlobStore {
    pub fn new(inner: Arc<MemoryBlobStore>) -> Self {
        Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn injected(operation: &'static str, bucket: &str, key: &str) -> OffloadError {
        let target = format!("s3://{bucket}/{key}");
        OffloadError::upstream(operation, target, MemoryError::new("injected failure"))
    }
}

/// Queue whose sends can be made to fail and whose receives can report
/// unreadable attributes.
pub struct FlakyQueue {
    pub inner: Arc<MemoryQueue>,
    pub fail_send: AtomicBool,
    pub unreadable_attributes: AtomicBool,
}

impl FlakyQueue {
    pub fn new(inner: Arc<MemoryQueue>) -> Self {
        Self {
            inner,
            fail_send: AtomicBool::new(false),
            unreadable_attributes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl QueueService for FlakyQueue {
    async fn send(&self, queue_url: &str, message: &Message) -> Result<SendOutput, OffloadError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(OffloadError::upstream(
                "send message to",
                queue_url,
                MemoryError::new("injected failure"),
            ));
        }
        self.inner.send(queue_url, message).await
    }

    async fn receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, OffloadError> {
        let mut received = self.inner.receive(request).await?;
        if self.unreadable_attributes.load(Ordering::SeqCst) {
            for message in &mut received {
                message.attributes = None;
                message.attribute_error =
                    Some("attribute odd has unexpected data type Custom".to_string());
            }
        }
        Ok(received)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError> {
        self.inner.delete(queue_url, receipt_handle).await
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    fn region(&self) -> &str {
        self.inner.region()
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OffloadError> {
        self.inner.bucket_exists(bucket).await
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OffloadError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("upload object", bucket, key));
        }
        self.inner.put(bucket, key, bytes).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OffloadError> {
        self.inner.get(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), OffloadError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::injected("delete object", bucket, key));
        }
        self.inner.delete(bucket, key).await
    }
}
