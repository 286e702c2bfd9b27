//! The two external collaborators the offload protocol sits between: a queue
//! (or topic) and a blob store. AWS implementations live in
//! [`crate::infrastructure::aws`]; in-memory ones in [`memory`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::OffloadError;
use crate::messages::{Message, MessageAttributes};

pub use memory::{MemoryBlobStore, MemoryQueue, MemoryTopic};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Region recorded in reference envelopes.
    fn region(&self) -> &str;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OffloadError>;

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OffloadError>;

    /// Returns [`OffloadError::NotFound`] if the object does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OffloadError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), OffloadError>;
}

#[async_trait]
pub trait QueueService: Send + Sync {
    async fn send(&self, queue_url: &str, message: &Message) -> Result<SendOutput, OffloadError>;

    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<ReceivedMessage>, OffloadError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError>;
}

#[async_trait]
pub trait TopicService: Send + Sync {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &Message,
    ) -> Result<PublishOutput, OffloadError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutput {
    pub message_id: Option<String>,
    pub md5_of_body: Option<String>,
    pub md5_of_attributes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutput {
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: String,
    pub attribute_names: Vec<String>,
    pub max_messages: i32,
    pub wait_time_seconds: i32,
    pub visibility_timeout: Option<i32>,
}

impl ReceiveRequest {
    #[must_use]
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            attribute_names: Vec::new(),
            max_messages: 1,
            wait_time_seconds: 0,
            visibility_timeout: None,
        }
    }

    #[must_use]
    pub fn with_attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_max_messages(mut self, max_messages: i32) -> Self {
        self.max_messages = max_messages;
        self
    }

    #[must_use]
    pub fn with_wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_visibility_timeout(mut self, seconds: i32) -> Self {
        self.visibility_timeout = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: Option<String>,
    pub body: String,
    pub attributes: Option<MessageAttributes>,
    pub receipt_handle: String,
    pub md5_of_body: Option<String>,
    pub md5_of_attributes: Option<String>,
    /// Why the provider's attributes could not be read; `attributes` is then `None`.
    pub attribute_error: Option<String>,
}

impl ReceivedMessage {
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message {
            body: self.body.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn region(&self) -> &str {
        (**self).region()
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, OffloadError> {
        (**self).bucket_exists(bucket).await
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OffloadError> {
        (**self).put(bucket, key, bytes).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OffloadError> {
        (**self).get(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), OffloadError> {
        (**self).delete(bucket, key).await
    }
}

#[async_trait]
impl<T: QueueService + ?Sized> QueueService for Arc<T> {
    async fn send(&self, queue_url: &str, message: &Message) -> Result<SendOutput, OffloadError> {
        (**self).send(queue_url, message).await
    }

    async fn receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, OffloadError> {
        (**self).receive(request).await
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError> {
        (**self).delete(queue_url, receipt_handle).await
    }
}

#[async_trait]
impl<T: TopicService + ?Sized> TopicService for Arc<T> {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &Message,
    ) -> Result<PublishOutput, OffloadError> {
        (**self).publish(topic_arn, message).await
    }
}
