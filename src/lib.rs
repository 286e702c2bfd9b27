/// Queue Offload - transparent large-message support for SQS and SNS, backed by S3.
///
/// Payloads too large for the queue are uploaded to a bucket and replaced in
/// the queue by a small, self-identifying reference envelope. On receive the
/// envelope is swapped back for the original body and attributes, and the
/// receipt handle is extended so that deleting the message also deletes the
/// blob.
///
/// # Architecture
///
/// The crate is organised as:
/// - `messages`: the message model, the wire codec stored in S3, MD5 digests,
///   envelopes and composite receipt handles
/// - `client`: the send/receive/delete orchestration for queues and topics
/// - `stores`: the queue, topic and blob store seams plus in-memory versions
/// - `infrastructure::aws`: SQS, SNS and S3 implementations of those seams
/// - `worker`: a Lambda consumer that resolves envelopes in SQS-triggered events
///
/// # Example
///
/// ```no_run
/// use queue_offload::{
///     Message, OffloadConfig, OffloadQueueClient, ReceiveRequest, S3BlobStore, SqsQueue,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     queue_offload::setup_logging();
///
///     let shared = queue_offload::infrastructure::aws::load_config().await;
///     let client = OffloadQueueClient::new(
///         SqsQueue::new(&shared),
///         S3BlobStore::new(&shared),
///         OffloadConfig::new("my-offload-bucket"),
///     )
///     .await?;
///
///     let queue_url = "https://sqs.us-west-2.amazonaws.com/123456789012/orders";
///     client.send(queue_url, &Message::new("x".repeat(1_000_000))).await?;
///
///     let request = ReceiveRequest::new(queue_url).with_attribute_names(["All"]);
///     for delivery in client.receive(&request).await? {
///         match delivery {
///             Ok(message) => {
///                 println!("received {} bytes", message.body.len());
///                 client.delete(queue_url, &message.receipt_handle).await?;
///             }
///             Err(failure) => eprintln!("{failure}"),
///         }
///     }
///
///     Ok(())
/// }
/// ```
// Module declarations
pub mod client;
pub mod core;
pub mod errors;
pub mod infrastructure;
pub mod messages;
pub mod stores;
pub mod worker;

pub use client::{Delivery, OffloadQueueClient, OffloadTopicClient, RetrievalFailure};
pub use crate::core::config::OffloadConfig;
pub use errors::{DecodeError, OffloadError};
pub use infrastructure::aws::{S3BlobStore, SnsTopic, SqsQueue};
pub use messages::{AttributeValue, Message, MessageAttributes};
pub use stores::{
    BlobStore, QueueService, ReceiveRequest, ReceivedMessage, SendOutput, TopicService,
};

/// Configure structured logging with JSON format for AWS Lambda environments.
///
/// This function sets up tracing-subscriber with a JSON formatter suitable for
/// `CloudWatch` Logs integration.
///
/// # Example
///
/// ```
/// queue_offload::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    tracing_subscriber::registry().with(fmt_layer).init();
}
