/// AWS services integration.
///
/// - S3 as the blob store
/// - SQS as the queue
/// - SNS as the topic
pub mod s3;
pub mod sns;
pub mod sqs;

pub use s3::S3BlobStore;
pub use sns::SnsTopic;
pub use sqs::SqsQueue;

/// Loads the shared AWS configuration from the Lambda/process environment.
pub async fn load_config() -> aws_config::SdkConfig {
    aws_config::from_env().load().await
}
