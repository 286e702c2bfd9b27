use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client as SnsClient;

use crate::errors::OffloadError;
use crate::messages::attributes::attributes_to_sns;
use crate::messages::Message;
use crate::stores::{PublishOutput, TopicService};

#[derive(Debug, Clone)]
pub struct SnsTopic {
    client: SnsClient,
}

impl SnsTopic {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(SnsClient::new(config))
    }

    #[must_use]
    pub fn from_client(client: SnsClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        Self::new(&super::load_config().await)
    }
}

#[async_trait]
impl TopicService for SnsTopic {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &Message,
    ) -> Result<PublishOutput, OffloadError> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(&message.body)
            .set_message_attributes(attributes_to_sns(message.attributes.as_ref())?)
            .send()
            .await
            .map_err(|e| OffloadError::upstream("publish to", topic_arn, e))?;

        Ok(PublishOutput {
            message_id: output.message_id().map(str::to_string),
        })
    }
}
