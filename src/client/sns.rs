use tracing::{debug, info, warn};

use super::{Offloader, Prepared};
use crate::core::config::OffloadConfig;
use crate::errors::OffloadError;
use crate::infrastructure::aws::{self, S3BlobStore, SnsTopic};
use crate::messages::{Destination, Message};
use crate::stores::{BlobStore, PublishOutput, TopicService};

/// Topic publisher that offloads oversized payloads the same way
/// [`super::OffloadQueueClient`] does. Queues subscribed with raw message
/// delivery receive the envelope, so the queue client reconstructs it.
#[derive(Debug)]
pub struct OffloadTopicClient<T, B> {
    topics: T,
    offloader: Offloader<B>,
}

impl OffloadTopicClient<SnsTopic, S3BlobStore> {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bucket check fails.
    pub async fn from_env() -> Result<Self, OffloadError> {
        let config = OffloadConfig::from_env()?;
        let shared = aws::load_config().await;
        Self::new(SnsTopic::new(&shared), S3BlobStore::new(&shared), config).await
    }
}

impl<T: TopicService, B: BlobStore> OffloadTopicClient<T, B> {
    /// # Errors
    ///
    /// Same as [`super::OffloadQueueClient::new`].
    pub async fn new(
        topics: T,
        blob_store: B,
        config: OffloadConfig,
    ) -> Result<Self, OffloadError> {
        let offloader = Offloader::connect(blob_store, config).await?;
        Ok(Self { topics, offloader })
    }

    #[must_use]
    pub fn config(&self) -> &OffloadConfig {
        self.offloader.config()
    }

    /// # Errors
    ///
    /// Returns [`OffloadError::MessageTooLarge`] before any I/O if the message
    /// exceeds the absolute limit, [`OffloadError::InvalidDestination`] for a
    /// malformed topic ARN when offloading, or any blob store or topic failure.
    pub async fn publish(
        &self,
        topic_arn: &str,
        message: &Message,
    ) -> Result<PublishOutput, OffloadError> {
        let destination = Destination::Topic(topic_arn.to_string());

        match self.offloader.prepare(&destination, message).await? {
            Prepared::Direct(message) => {
                let output = self.topics.publish(topic_arn, message).await?;
                debug!(topic_arn, message_id = ?output.message_id, "published message directly");
                Ok(output)
            }
            Prepared::Offloaded { payload, reference } => {
                let location = &reference.location;
                let output = self.topics.publish(topic_arn, &payload).await.inspect_err(|e| {
                    warn!(
                        topic_arn,
                        bucket = %location.bucket,
                        key = %location.key,
                        error = %e,
                        "publish failed after upload, offloaded payload is orphaned"
                    );
                })?;
                info!(
                    topic_arn,
                    message_id = ?output.message_id,
                    key = %location.key,
                    "published reference envelope"
                );
                Ok(output)
            }
        }
    }
}
