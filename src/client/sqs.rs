use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{Offloader, Prepared};
use crate::core::config::OffloadConfig;
use crate::errors::OffloadError;
use crate::infrastructure::aws::{self, S3BlobStore, SqsQueue};
use crate::messages::{
    CompositeReceiptHandle, Destination, EnvelopeKind, ErrorEnvelope, Message, ReceiptHandle,
    ReferenceEnvelope,
};
use crate::stores::{BlobStore, QueueService, ReceiveRequest, ReceivedMessage, SendOutput};

/// One message out of a receive: reconstructed, or the reason it could not be.
pub type Delivery = Result<ReceivedMessage, RetrievalFailure>;

/// A received message whose payload could not be reconstructed.
///
/// Carries the message as received so the caller can still delete it. Once
/// the envelope has parsed, its receipt handle is already the composite one,
/// so [`OffloadQueueClient::delete`] also removes whatever blob remains.
#[derive(Debug, Error)]
#[error("Failed to reconstruct received message: {source}")]
pub struct RetrievalFailure {
    pub message: ReceivedMessage,
    pub reference: Option<ReferenceEnvelope>,
    #[source]
    pub source: OffloadError,
}

impl RetrievalFailure {
    fn new(
        message: ReceivedMessage,
        source: OffloadError,
        reference: Option<ReferenceEnvelope>,
    ) -> Self {
        error!(
            message_id = ?message.message_id,
            error = %source,
            "failed to reconstruct received message"
        );
        Self {
            message,
            reference,
            source,
        }
    }

    #[must_use]
    pub fn error_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(&self.source, self.reference.clone())
    }

    /// The failed message with its body replaced by an error envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be rendered.
    pub fn into_error_message(self) -> Result<ReceivedMessage, OffloadError> {
        let body = self.error_envelope().to_json()?;
        Ok(ReceivedMessage {
            body,
            attributes: None,
            md5_of_body: None,
            md5_of_attributes: None,
            ..self.message
        })
    }
}

/// Queue client that moves oversized payloads through the blob store.
///
/// Holds no state between calls beyond its immutable configuration, so one
/// client can serve concurrent tasks.
#[derive(Debug)]
pub struct OffloadQueueClient<Q, B> {
    queue: Q,
    offloader: Offloader<B>,
}

impl OffloadQueueClient<SqsQueue, S3BlobStore> {
    /// SQS and S3 clients from the ambient AWS configuration, offload
    /// settings from `OFFLOAD_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bucket check fails.
    pub async fn from_env() -> Result<Self, OffloadError> {
        let config = OffloadConfig::from_env()?;
        let shared = aws::load_config().await;
        Self::new(SqsQueue::new(&shared), S3BlobStore::new(&shared), config).await
    }
}

impl<Q: QueueService, B: BlobStore> OffloadQueueClient<Q, B> {
    /// # Errors
    ///
    /// Returns [`OffloadError::Config`] for an invalid configuration,
    /// [`OffloadError::BucketUnavailable`] if the bucket does not exist, and
    /// [`OffloadError::Upstream`] if the existence check itself fails.
    pub async fn new(queue: Q, blob_store: B, config: OffloadConfig) -> Result<Self, OffloadError> {
        let offloader = Offloader::connect(blob_store, config).await?;
        Ok(Self { queue, offloader })
    }

    #[must_use]
    pub fn config(&self) -> &OffloadConfig {
        self.offloader.config()
    }

    /// Sends `message`, offloading its payload if it is too large for the queue.
    ///
    /// For an offloaded message the returned digests are those of the real
    /// payload, not of the envelope the queue actually stored.
    ///
    /// # Errors
    ///
    /// Returns [`OffloadError::MessageTooLarge`] before any I/O if the message
    /// exceeds the absolute limit; otherwise any codec, blob store or queue
    /// failure. A queue failure after a successful upload leaves the blob behind.
    pub async fn send(
        &self,
        queue_url: &str,
        message: &Message,
    ) -> Result<SendOutput, OffloadError> {
        let destination = Destination::Queue(queue_url.to_string());

        match self.offloader.prepare(&destination, message).await? {
            Prepared::Direct(message) => {
                let output = self.queue.send(queue_url, message).await?;
                debug!(queue_url, message_id = ?output.message_id, "sent message directly");
                Ok(output)
            }
            Prepared::Offloaded { payload, reference } => {
                let location = &reference.location;
                let mut output = self.queue.send(queue_url, &payload).await.inspect_err(|e| {
                    warn!(
                        queue_url,
                        bucket = %location.bucket,
                        key = %location.key,
                        error = %e,
                        "queue send failed after upload, offloaded payload is orphaned"
                    );
                })?;
                info!(
                    queue_url,
                    message_id = ?output.message_id,
                    key = %location.key,
                    "sent reference envelope"
                );

                output.md5_of_body = Some(reference.body_digest.clone());
                output.md5_of_attributes = reference.digests().attributes_digest();
                Ok(output)
            }
        }
    }

    /// Receives a batch and reconstructs every offloaded message in it.
    ///
    /// Each message resolves independently: a missing or corrupt blob, or
    /// attributes the queue could not convert, becomes a [`RetrievalFailure`]
    /// for that message only.
    ///
    /// # Errors
    ///
    /// Returns an error only if the queue receive itself fails.
    pub async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<Delivery>, OffloadError> {
        let received = self.queue.receive(request).await?;
        debug!(queue_url = %request.queue_url, count = received.len(), "received messages");

        Ok(join_all(received.into_iter().map(|message| self.reconstruct(message))).await)
    }

    async fn reconstruct(&self, mut message: ReceivedMessage) -> Delivery {
        if let Some(reason) = message.attribute_error.take() {
            let source = OffloadError::InvalidAttribute(reason);
            return Err(RetrievalFailure::new(message, source, None));
        }
        match EnvelopeKind::sniff(&message.body) {
            EnvelopeKind::Plain => Ok(message),
            EnvelopeKind::Error => {
                warn!(
                    message_id = ?message.message_id,
                    "received an error envelope, delivering it unchanged"
                );
                Ok(message)
            }
            EnvelopeKind::Reference => self.resolve(message).await,
        }
    }

    async fn resolve(&self, message: ReceivedMessage) -> Delivery {
        let reference = match ReferenceEnvelope::from_json(&message.body) {
            Ok(reference) => reference,
            Err(source) => return Err(RetrievalFailure::new(message, source, None)),
        };
        let receipt_handle =
            CompositeReceiptHandle::new(&message.receipt_handle, &reference.location).encode();

        match self.offloader.fetch(&reference).await {
            Ok(payload) => Ok(ReceivedMessage {
                body: payload.body,
                attributes: payload.attributes,
                receipt_handle,
                md5_of_body: Some(reference.body_digest.clone()),
                md5_of_attributes: reference.digests().attributes_digest(),
                ..message
            }),
            Err(source) => Err(RetrievalFailure::new(
                ReceivedMessage {
                    receipt_handle,
                    ..message
                },
                source,
                Some(reference),
            )),
        }
    }

    /// Deletes a received message. A composite handle deletes the blob first
    /// and the queue entry second; if the blob delete fails the queue entry
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`OffloadError::ReceiptHandle`] for a malformed composite
    /// handle, or the first blob store or queue failure.
    pub async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError> {
        match ReceiptHandle::decode(receipt_handle)? {
            ReceiptHandle::Plain(handle) => self.queue.delete(queue_url, &handle).await,
            ReceiptHandle::Composite(composite) => {
                self.offloader
                    .discard(&composite.bucket, &composite.key)
                    .await
                    .inspect_err(|e| {
                        error!(
                            queue_url,
                            bucket = %composite.bucket,
                            key = %composite.key,
                            error = %e,
                            "blob delete failed, keeping queue entry"
                        );
                    })?;
                self.queue.delete(queue_url, &composite.inner).await
            }
        }
    }
}
