//! In-process stand-ins for S3, SQS and SNS.
//!
//! They keep the provider behaviours the offload protocol depends on: missing
//! objects surface as [`OffloadError::NotFound`], receives hide in-flight
//! messages, deletes need the receipt handle from the latest receive, and the
//! queue reports MD5 digests the way SQS does.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    BlobStore, PublishOutput, QueueService, ReceiveRequest, ReceivedMessage, SendOutput,
    TopicService,
};
use crate::errors::OffloadError;
use crate::messages::digest::md5_hex;
use crate::messages::{Digests, Message, MessageAttributes};

const MAX_RECEIVE_BATCH: usize = 10;

/// Provider-side rejection raised by the in-memory services.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MemoryError(String);

impl MemoryError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug)]
pub struct MemoryBlobStore {
    region: String,
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.lock().await;
        buckets.get(bucket).and_then(|objects| objects.get(key)).cloned()
    }

    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.lock().await;
        let mut keys: Vec<String> = buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        let buckets = self.buckets.lock().await;
        buckets.get(bucket).map_or(0, HashMap::len)
    }
}

fn no_such_bucket(operation: &'static str, bucket: &str, key: &str) -> OffloadError {
    OffloadError::upstream(
        operation,
        format!("s3://{bucket}/{key}"),
        MemoryError::new(format!("bucket {bucket} does not exist")),
    )
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn region(&self) -> &str {
        &self.region
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OffloadError> {
        Ok(self.buckets.lock().await.contains_key(bucket))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OffloadError> {
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket("upload object", bucket, key))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OffloadError> {
        let buckets = self.buckets.lock().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket("download object", bucket, key))?;
        objects.get(key).cloned().ok_or_else(|| OffloadError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), OffloadError> {
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket("delete object", bucket, key))?;
        objects.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    message: Message,
    /// Set while the message is in flight.
    receipt_handle: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message still held by the queue, in flight or not.
    pub async fn pending(&self, queue_url: &str) -> Vec<Message> {
        let queues = self.queues.lock().await;
        queues
            .get(queue_url)
            .map(|queue| queue.iter().map(|stored| stored.message.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, queue_url: &str) -> usize {
        self.queues.lock().await.get(queue_url).map_or(0, VecDeque::len)
    }
}

/// `All`, `.*` and `prefix.*` patterns as SQS accepts them.
fn attribute_name_matches(pattern: &str, name: &str) -> bool {
    match pattern {
        "All" | ".*" => true,
        _ => pattern
            .strip_suffix('*')
            .filter(|prefix| prefix.ends_with('.'))
            .map_or(pattern == name, |prefix| name.starts_with(prefix)),
    }
}

fn select_attributes(
    attributes: Option<&MessageAttributes>,
    names: &[String],
) -> Option<MessageAttributes> {
    let selected: MessageAttributes = attributes?
        .iter()
        .filter(|(name, _)| names.iter().any(|pattern| attribute_name_matches(pattern, name)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    (!selected.is_empty()).then_some(selected)
}

#[async_trait]
impl QueueService for MemoryQueue {
    async fn send(&self, queue_url: &str, message: &Message) -> Result<SendOutput, OffloadError> {
        let digests = Digests::of_message(message)?;
        let message_id = Uuid::new_v4().to_string();

        let mut queues = self.queues.lock().await;
        queues.entry(queue_url.to_string()).or_default().push_back(StoredMessage {
            message_id: message_id.clone(),
            message: message.clone(),
            receipt_handle: None,
        });
        debug!(queue_url, message_id = %message_id, "memory queue accepted message");

        Ok(SendOutput {
            message_id: Some(message_id),
            md5_of_body: Some(digests.body.clone()),
            md5_of_attributes: digests.attributes_digest(),
        })
    }

    async fn receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, OffloadError> {
        let limit = usize::try_from(request.max_messages)
            .unwrap_or(1)
            .clamp(1, MAX_RECEIVE_BATCH);

        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.get_mut(&request.queue_url) else {
            return Ok(Vec::new());
        };

        let mut received = Vec::new();
        let available = queue
            .iter_mut()
            .filter(|stored| stored.receipt_handle.is_none())
            .take(limit);
        for stored in available {
            let receipt_handle = Uuid::new_v4().simple().to_string();
            stored.receipt_handle = Some(receipt_handle.clone());

            let attributes =
                select_attributes(stored.message.attributes.as_ref(), &request.attribute_names);
            let visible = Message {
                body: stored.message.body.clone(),
                attributes,
            };
            let md5_of_attributes = Digests::of_message(&visible)?.attributes_digest();

            received.push(ReceivedMessage {
                message_id: Some(stored.message_id.clone()),
                md5_of_body: Some(md5_hex(visible.body.as_bytes())),
                md5_of_attributes,
                body: visible.body,
                attributes: visible.attributes,
                receipt_handle,
                attribute_error: None,
            });
        }
        Ok(received)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError> {
        let mut queues = self.queues.lock().await;
        let position = queues.get(queue_url).and_then(|queue| {
            queue
                .iter()
                .position(|stored| stored.receipt_handle.as_deref() == Some(receipt_handle))
        });

        match (queues.get_mut(queue_url), position) {
            (Some(queue), Some(index)) => {
                queue.remove(index);
                Ok(())
            }
            _ => Err(OffloadError::upstream(
                "delete message from",
                queue_url,
                MemoryError::new(format!("receipt handle {receipt_handle} is invalid")),
            )),
        }
    }
}

/// Fans published messages out to subscribed [`MemoryQueue`]s with raw
/// message delivery, so subscribers see the published body and attributes.
#[derive(Debug, Default)]
pub struct MemoryTopic {
    subscriptions: Mutex<HashMap<String, Vec<(Arc<MemoryQueue>, String)>>>,
}

impl MemoryTopic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(
        &self,
        topic_arn: impl Into<String>,
        queue: Arc<MemoryQueue>,
        queue_url: impl Into<String>,
    ) {
        self.subscriptions
            .lock()
            .await
            .entry(topic_arn.into())
            .or_default()
            .push((queue, queue_url.into()));
    }
}

#[async_trait]
impl TopicService for MemoryTopic {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &Message,
    ) -> Result<PublishOutput, OffloadError> {
        let subscribers = self
            .subscriptions
            .lock()
            .await
            .get(topic_arn)
            .cloned()
            .ok_or_else(|| {
                OffloadError::upstream(
                    "publish to",
                    topic_arn,
                    MemoryError::new(format!("topic {topic_arn} does not exist")),
                )
            })?;

        for (queue, queue_url) in &subscribers {
            queue.send(queue_url, message).await?;
        }

        Ok(PublishOutput {
            message_id: Some(Uuid::new_v4().to_string()),
        })
    }
}
