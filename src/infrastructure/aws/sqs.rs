use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_sqs::types::Message as SqsMessage;
use tracing::warn;

use crate::errors::OffloadError;
use crate::messages::attributes::{attributes_from_sqs, attributes_to_sqs};
use crate::messages::Message;
use crate::stores::{QueueService, ReceiveRequest, ReceivedMessage, SendOutput};

#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: SqsClient,
}

impl SqsQueue {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(SqsClient::new(config))
    }

    #[must_use]
    pub fn from_client(client: SqsClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        Self::new(&super::load_config().await)
    }
}

/// A message whose attributes cannot be converted keeps its place in the
/// batch, with the reason in `attribute_error`.
fn received_from_sqs(m: &SqsMessage) -> ReceivedMessage {
    let (attributes, attribute_error) = match attributes_from_sqs(m.message_attributes()) {
        Ok(attributes) => (attributes, None),
        Err(e) => {
            warn!(
                message_id = ?m.message_id(),
                error = %e,
                "received message with unreadable attributes"
            );
            let reason = match e {
                OffloadError::InvalidAttribute(reason) => reason,
                other => other.to_string(),
            };
            (None, Some(reason))
        }
    };

    ReceivedMessage {
        message_id: m.message_id().map(str::to_string),
        body: m.body().unwrap_or_default().to_string(),
        attributes,
        receipt_handle: m.receipt_handle().unwrap_or_default().to_string(),
        md5_of_body: m.md5_of_body().map(str::to_string),
        md5_of_attributes: m.md5_of_message_attributes().map(str::to_string),
        attribute_error,
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn send(&self, queue_url: &str, message: &Message) -> Result<SendOutput, OffloadError> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(&message.body)
            .set_message_attributes(attributes_to_sqs(message.attributes.as_ref())?)
            .send()
            .await
            .map_err(|e| OffloadError::upstream("send message to", queue_url, e))?;

        Ok(SendOutput {
            message_id: output.message_id().map(str::to_string),
            md5_of_body: output.md5_of_message_body().map(str::to_string),
            md5_of_attributes: output.md5_of_message_attributes().map(str::to_string),
        })
    }

    async fn receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, OffloadError> {
        let attribute_names =
            (!request.attribute_names.is_empty()).then(|| request.attribute_names.clone());

        let output = self
            .client
            .receive_message()
            .queue_url(&request.queue_url)
            .max_number_of_messages(request.max_messages)
            .wait_time_seconds(request.wait_time_seconds)
            .set_visibility_timeout(request.visibility_timeout)
            .set_message_attribute_names(attribute_names)
            .send()
            .await
            .map_err(|e| {
                OffloadError::upstream("receive messages from", request.queue_url.as_str(), e)
            })?;

        Ok(output.messages().iter().map(received_from_sqs).collect())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), OffloadError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| OffloadError::upstream("delete message from", queue_url, e))?;
        Ok(())
    }
}
