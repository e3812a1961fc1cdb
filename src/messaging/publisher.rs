use async_trait::async_trait;

use super::{PublishError, RedpandaClient};
use crate::events::{self, ChangeEvent};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), PublishError>;
}

/// Publishes protobuf-encoded change events, keyed by subject id so every
/// event for one subject lands on the same partition.
pub struct KafkaEventPublisher {
    client: RedpandaClient,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(client: RedpandaClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }

    pub fn client(&self) -> &RedpandaClient {
        &self.client
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), PublishError> {
        let payload = events::encode(event);

        tracing::debug!(
            subject_id = %event.subject_id,
            topic = %self.topic,
            "Publishing subject change event"
        );

        self.client.publish(&self.topic, &event.subject_id, &payload).await
    }
}
