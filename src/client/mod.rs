//! Offload orchestration for queues ([`OffloadQueueClient`]) and topics
//! ([`OffloadTopicClient`]).
//!
//! Both share the send-side pipeline in [`Offloader`]: classify, encode,
//! digest, upload, then swap the body for a reference envelope.

pub mod sns;
pub mod sqs;

pub use sns::OffloadTopicClient;
pub use sqs::{Delivery, OffloadQueueClient, RetrievalFailure};

use tracing::{debug, info, warn};

use crate::core::config::OffloadConfig;
use crate::errors::OffloadError;
use crate::messages::{
    AttributeValue, Classification, Destination, Digests, Message, ReferenceEnvelope, codec,
};
use crate::stores::BlobStore;

/// Attribute every offloaded queue payload carries.
pub const VERSION_ATTRIBUTE: &str = "offload-client-version";
pub const WIRE_VERSION: &str = "v1";

/// What to hand the provider for one send.
#[derive(Debug)]
pub(crate) enum Prepared<'a> {
    Direct(&'a Message),
    Offloaded {
        payload: Message,
        reference: ReferenceEnvelope,
    },
}

/// Blob-store half of the protocol, owned by both clients.
#[derive(Debug)]
pub(crate) struct Offloader<B> {
    blob_store: B,
    config: OffloadConfig,
}

impl<B: BlobStore> Offloader<B> {
    /// Validates `config` and checks once that its bucket exists.
    pub(crate) async fn connect(
        blob_store: B,
        config: OffloadConfig,
    ) -> Result<Self, OffloadError> {
        config.validate()?;
        if !blob_store.bucket_exists(&config.bucket).await? {
            return Err(OffloadError::BucketUnavailable(format!(
                "bucket {} does not exist or is not accessible",
                config.bucket
            )));
        }
        info!(
            bucket = %config.bucket,
            always_offload = config.always_offload,
            direct_limit = config.direct_limit,
            absolute_limit = config.absolute_limit,
            "offload client ready"
        );
        Ok(Self { blob_store, config })
    }

    pub(crate) fn config(&self) -> &OffloadConfig {
        &self.config
    }

    pub(crate) async fn prepare<'a>(
        &self,
        destination: &Destination,
        message: &'a Message,
    ) -> Result<Prepared<'a>, OffloadError> {
        let classification = Classification::classify(message, &self.config).accept()?;
        let Classification::Offload { size } = classification else {
            return Ok(Prepared::Direct(message));
        };
        if message.body.is_empty() {
            debug!(destination = destination.as_str(), "empty body, sending as is");
            return Ok(Prepared::Direct(message));
        }

        let encoded = codec::encode(message)?;
        let digests = Digests::compute(&encoded);
        let reference = ReferenceEnvelope::for_destination(
            destination,
            self.blob_store.region(),
            &self.config.bucket,
            digests,
        )?;
        let payload = Message::new(reference.to_json()?)
            .with_attribute(VERSION_ATTRIBUTE, AttributeValue::string(WIRE_VERSION));

        let location = &reference.location;
        self.blob_store
            .put(&location.bucket, &location.key, encoded.into_bytes())
            .await?;
        info!(size, bucket = %location.bucket, key = %location.key, "offloaded message payload");

        Ok(Prepared::Offloaded { payload, reference })
    }

    pub(crate) async fn fetch(
        &self,
        reference: &ReferenceEnvelope,
    ) -> Result<Message, OffloadError> {
        fetch_offloaded(&self.blob_store, reference).await
    }

    pub(crate) async fn discard(&self, bucket: &str, key: &str) -> Result<(), OffloadError> {
        self.blob_store.delete(bucket, key).await?;
        info!(bucket, key, "deleted offloaded payload");
        Ok(())
    }
}

/// Downloads and decodes the payload a reference envelope points at, checking
/// it against the envelope's digests.
///
/// # Errors
///
/// Returns [`OffloadError::NotFound`] if the blob is gone,
/// [`OffloadError::Decoding`] if it is not a valid payload, and
/// [`OffloadError::DigestMismatch`] if it decodes to different content.
pub async fn fetch_offloaded<B>(
    blob_store: &B,
    reference: &ReferenceEnvelope,
) -> Result<Message, OffloadError>
where
    B: BlobStore + ?Sized,
{
    let location = &reference.location;
    let bytes = blob_store.get(&location.bucket, &location.key).await?;
    let size = bytes.len();
    let message = codec::decode(&bytes)?;

    if Digests::of_message(&message)? != reference.digests() {
        warn!(
            bucket = %location.bucket,
            key = %location.key,
            "offloaded payload does not match its digests"
        );
        return Err(OffloadError::DigestMismatch {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
        });
    }

    debug!(size, bucket = %location.bucket, key = %location.key, "downloaded offloaded payload");
    Ok(message)
}
